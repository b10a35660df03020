//! Owns the broad phase and the contact arena; turns broad-phase pairs
//! into persistent contacts and drives the narrow phase each step.

use log::trace;

use crate::collision::broad_phase::BroadPhase;
use crate::common::arena::Arena;
use crate::dynamics::body::{Body, BodyType};
use crate::dynamics::contacts::{Contact, ContactHandle};
use crate::dynamics::fixture::{Fixture, FixtureHandle};
use crate::dynamics::joints::Joint;
use crate::dynamics::world_callbacks::{filter_should_collide, ContactFilter, ContactListener};

pub(crate) struct ContactManager {
    pub broad_phase: BroadPhase<FixtureHandle>,
    pub contacts: Arena<Contact>,
}

/// Joint edges can suppress collision between the two bodies they join.
fn joints_allow_collision(
    body: &Body,
    other: crate::dynamics::body::BodyHandle,
    joints: &Arena<Joint>,
) -> bool {
    for &handle in &body.joints {
        if let Some(joint) = joints.get(handle) {
            let connects = joint.body_a == other || joint.body_b == other;
            if connects && !joint.collide_connected {
                return false;
            }
        }
    }
    true
}

impl ContactManager {
    pub fn new() -> Self {
        ContactManager {
            broad_phase: BroadPhase::new(),
            contacts: Arena::new(),
        }
    }

    /// Process the broad-phase move buffer and create contacts for new
    /// overlapping pairs.
    pub fn find_new_contacts(
        &mut self,
        bodies: &mut Arena<Body>,
        fixtures: &Arena<Fixture>,
        joints: &Arena<Joint>,
        mut filter: Option<&mut (dyn ContactFilter + '_)>,
    ) {
        let mut pairs: Vec<(FixtureHandle, FixtureHandle)> = Vec::new();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));

        for (handle_a, handle_b) in pairs {
            self.add_pair(handle_a, handle_b, bodies, fixtures, joints, filter.as_deref_mut());
        }
    }

    fn add_pair(
        &mut self,
        handle_a: FixtureHandle,
        handle_b: FixtureHandle,
        bodies: &mut Arena<Body>,
        fixtures: &Arena<Fixture>,
        joints: &Arena<Joint>,
        filter: Option<&mut (dyn ContactFilter + '_)>,
    ) {
        let (fixture_a, fixture_b) = match (fixtures.get(handle_a), fixtures.get(handle_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        let body_handle_a = fixture_a.body;
        let body_handle_b = fixture_b.body;
        if body_handle_a == body_handle_b {
            return;
        }

        let (body_a, body_b) = match bodies.pair_mut(body_handle_a, body_handle_b) {
            Some(pair) => pair,
            None => return,
        };

        // The pair may already have a contact from an earlier overlap.
        for &handle in &body_b.contacts {
            if let Some(contact) = self.contacts.get(handle) {
                let same = (contact.fixture_a == handle_a && contact.fixture_b == handle_b)
                    || (contact.fixture_a == handle_b && contact.fixture_b == handle_a);
                if same {
                    return;
                }
            }
        }

        if !body_b.should_collide(body_a) {
            return;
        }
        if !joints_allow_collision(body_b, body_handle_a, joints) {
            return;
        }
        match filter {
            Some(f) => {
                if !f.should_collide(fixture_a, fixture_b) {
                    return;
                }
            }
            None => {
                if !filter_should_collide(&fixture_a.filter, &fixture_b.filter) {
                    return;
                }
            }
        }

        let continuous = body_a.body_type != BodyType::Dynamic
            || body_a.bullet
            || body_b.body_type != BodyType::Dynamic
            || body_b.bullet;

        let contact = Contact::new(handle_a, handle_b, fixture_a, fixture_b, continuous);
        let handle = self.contacts.insert(contact);
        body_a.contacts.push(handle);
        body_b.contacts.push(handle);
        trace!("created contact {handle:?}");
    }

    /// Remove a contact, waking its bodies if it was still touching.
    pub fn destroy(
        &mut self,
        handle: ContactHandle,
        bodies: &mut Arena<Body>,
        listener: Option<&mut (dyn ContactListener + '_)>,
    ) {
        let contact = match self.contacts.get(handle) {
            Some(c) => c,
            None => return,
        };

        if contact.touching {
            if let Some(listener) = listener {
                listener.end_contact(contact);
            }
        }

        let (body_handle_a, body_handle_b, touching) =
            (contact.body_a, contact.body_b, contact.touching);

        if let Some((body_a, body_b)) = bodies.pair_mut(body_handle_a, body_handle_b) {
            body_a.contacts.retain(|&c| c != handle);
            body_b.contacts.retain(|&c| c != handle);
            if touching {
                body_a.set_awake(true);
                body_b.set_awake(true);
            }
        }

        self.contacts.remove(handle);
        trace!("destroyed contact {handle:?}");
    }

    /// Narrow-phase pass: re-filter flagged pairs, drop pairs whose fat
    /// boxes separated, and update the manifolds of the rest.
    pub fn collide(
        &mut self,
        bodies: &mut Arena<Body>,
        fixtures: &Arena<Fixture>,
        joints: &Arena<Joint>,
        mut filter: Option<&mut (dyn ContactFilter + '_)>,
        mut listener: Option<&mut (dyn ContactListener + '_)>,
    ) {
        let handles = self.contacts.handles();

        for handle in handles {
            let contact = match self.contacts.get(handle) {
                Some(c) => c,
                None => continue,
            };
            let fixture_handle_a = contact.fixture_a;
            let fixture_handle_b = contact.fixture_b;
            let body_handle_a = contact.body_a;
            let body_handle_b = contact.body_b;
            let filter_pending = contact.filter_pending;

            let fixture_a = fixtures.get(fixture_handle_a).expect("fixture missing");
            let fixture_b = fixtures.get(fixture_handle_b).expect("fixture missing");
            let body_a = bodies.get(body_handle_a).expect("body missing");
            let body_b = bodies.get(body_handle_b).expect("body missing");

            if filter_pending {
                let mut keep = body_b.should_collide(body_a)
                    && joints_allow_collision(body_b, body_handle_a, joints);
                if keep {
                    keep = match filter.as_deref_mut() {
                        Some(f) => f.should_collide(fixture_a, fixture_b),
                        None => filter_should_collide(&fixture_a.filter, &fixture_b.filter),
                    };
                }
                if !keep {
                    self.destroy(handle, bodies, listener.as_deref_mut());
                    continue;
                }
                if let Some(contact) = self.contacts.get_mut(handle) {
                    contact.filter_pending = false;
                }
            }

            if !body_a.awake && !body_b.awake {
                continue;
            }

            // The fat boxes no longer overlap; retire the contact.
            if !self
                .broad_phase
                .test_overlap(fixture_a.proxy_id, fixture_b.proxy_id)
            {
                self.destroy(handle, bodies, listener.as_deref_mut());
                continue;
            }

            let xf_a = body_a.xf;
            let xf_b = body_b.xf;
            let contact = self.contacts.get_mut(handle).expect("contact missing");
            let update = contact.update(&fixture_a.shape, &xf_a, &fixture_b.shape, &xf_b);

            if let Some(listener) = listener.as_deref_mut() {
                let contact = self.contacts.get_mut(handle).expect("contact missing");
                if update.began {
                    listener.begin_contact(contact);
                }
                if update.ended {
                    listener.end_contact(contact);
                }
                if contact.touching && !contact.sensor {
                    let enabled = listener.pre_solve(contact, &update.old_manifold);
                    contact.enabled = enabled;
                }
            }
        }
    }
}

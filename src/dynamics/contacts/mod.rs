//! Persistent contacts between fixture pairs.

pub mod contact_solver;

use crate::collision::collide_circle::{collide_circles, collide_polygon_and_circle};
use crate::collision::collide_polygon::collide_polygons;
use crate::collision::manifold::Manifold;
use crate::collision::shapes::{PolygonShape, Shape};
use crate::collision::test_overlap;
use crate::common::arena::Handle;
use crate::common::math::Transform;
use crate::dynamics::body::BodyHandle;
use crate::dynamics::fixture::{Fixture, FixtureHandle};

pub type ContactHandle = Handle<Contact>;

/// Which narrow-phase routine a contact dispatches to. Fixtures are put in
/// canonical order at creation so each pairing appears exactly once here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Circles,
    PolygonCircle,
    Polygons,
    EdgeCircle,
    PolygonEdge,
}

impl ContactKind {
    /// Classify a shape pair. Returns the kind and whether the fixtures
    /// must swap to reach canonical order (polygon before circle, polygon
    /// before edge, edge before circle).
    pub fn classify(shape_a: &Shape, shape_b: &Shape) -> (ContactKind, bool) {
        match (shape_a, shape_b) {
            (Shape::Circle(_), Shape::Circle(_)) => (ContactKind::Circles, false),
            (Shape::Polygon(_), Shape::Circle(_)) => (ContactKind::PolygonCircle, false),
            (Shape::Circle(_), Shape::Polygon(_)) => (ContactKind::PolygonCircle, true),
            (Shape::Polygon(_), Shape::Polygon(_)) => (ContactKind::Polygons, false),
            (Shape::Edge(_), Shape::Circle(_)) => (ContactKind::EdgeCircle, false),
            (Shape::Circle(_), Shape::Edge(_)) => (ContactKind::EdgeCircle, true),
            (Shape::Polygon(_), Shape::Edge(_)) => (ContactKind::PolygonEdge, false),
            (Shape::Edge(_), Shape::Polygon(_)) => (ContactKind::PolygonEdge, true),
            // Two edges have no volume between them; nothing to solve.
            (Shape::Edge(_), Shape::Edge(_)) => (ContactKind::PolygonEdge, false),
        }
    }
}

/// What changed during a manifold update; the contact manager turns these
/// into listener callbacks.
#[derive(Debug, Clone, Copy)]
pub struct ContactUpdate {
    pub began: bool,
    pub ended: bool,
    pub old_manifold: Manifold,
}

#[derive(Debug)]
pub struct Contact {
    pub(crate) fixture_a: FixtureHandle,
    pub(crate) fixture_b: FixtureHandle,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) kind: ContactKind,
    pub(crate) manifold: Manifold,

    pub(crate) sensor: bool,
    /// One side is non-dynamic or a bullet: eligible for TOI.
    pub(crate) continuous: bool,
    pub(crate) island_flag: bool,
    pub(crate) touching: bool,
    pub(crate) enabled: bool,
    /// Re-run the collision filter on the next collide pass.
    pub(crate) filter_pending: bool,

    pub(crate) toi: f32,
    pub(crate) toi_valid: bool,
}

impl Contact {
    /// Build a contact for two fixtures, swapping them into canonical
    /// order for the narrow phase.
    pub(crate) fn new(
        handle_a: FixtureHandle,
        handle_b: FixtureHandle,
        fixture_a: &Fixture,
        fixture_b: &Fixture,
        continuous: bool,
    ) -> Self {
        let (kind, swap) = ContactKind::classify(&fixture_a.shape, &fixture_b.shape);
        let (fa, fb, ba, bb) = if swap {
            (handle_b, handle_a, fixture_b.body, fixture_a.body)
        } else {
            (handle_a, handle_b, fixture_a.body, fixture_b.body)
        };

        Contact {
            fixture_a: fa,
            fixture_b: fb,
            body_a: ba,
            body_b: bb,
            kind,
            manifold: Manifold::default(),
            sensor: fixture_a.is_sensor || fixture_b.is_sensor,
            continuous,
            island_flag: false,
            touching: false,
            enabled: true,
            filter_pending: false,
            toi: 0.0,
            toi_valid: false,
        }
    }

    pub fn fixture_a(&self) -> FixtureHandle {
        self.fixture_a
    }

    pub fn fixture_b(&self) -> FixtureHandle {
        self.fixture_b
    }

    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn is_touching(&self) -> bool {
        self.touching
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    /// Flag the pair for re-filtering on the next collide pass.
    pub fn flag_for_filtering(&mut self) {
        self.filter_pending = true;
    }

    /// Run the narrow phase for the current transforms.
    pub(crate) fn evaluate(&self, shape_a: &Shape, xf_a: &Transform, shape_b: &Shape, xf_b: &Transform) -> Manifold {
        match self.kind {
            ContactKind::Circles => match (shape_a, shape_b) {
                (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
                _ => Manifold::default(),
            },
            ContactKind::PolygonCircle => match (shape_a, shape_b) {
                (Shape::Polygon(p), Shape::Circle(c)) => {
                    collide_polygon_and_circle(p, xf_a, c, xf_b)
                }
                _ => Manifold::default(),
            },
            ContactKind::Polygons => match (shape_a, shape_b) {
                (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
                _ => Manifold::default(),
            },
            ContactKind::EdgeCircle => match (shape_a, shape_b) {
                (Shape::Edge(e), Shape::Circle(c)) => {
                    let segment = PolygonShape::new_segment(e.v1, e.v2);
                    collide_polygon_and_circle(&segment, xf_a, c, xf_b)
                }
                _ => Manifold::default(),
            },
            ContactKind::PolygonEdge => match (shape_a, shape_b) {
                (Shape::Polygon(p), Shape::Edge(e)) => {
                    let segment = PolygonShape::new_segment(e.v1, e.v2);
                    collide_polygons(p, xf_a, &segment, xf_b)
                }
                _ => Manifold::default(),
            },
        }
    }

    /// Recompute the manifold, carrying impulses across matching feature
    /// ids so the solver can warm-start. Sensors only track overlap.
    pub(crate) fn update(
        &mut self,
        shape_a: &Shape,
        xf_a: &Transform,
        shape_b: &Shape,
        xf_b: &Transform,
    ) -> ContactUpdate {
        let old_manifold = self.manifold;
        let was_touching = self.touching;

        // Re-enable; PreSolve gets a fresh chance to disable each update.
        self.enabled = true;

        if self.sensor {
            self.touching = test_overlap(shape_a, xf_a, shape_b, xf_b);
            self.manifold.count = 0;
        } else {
            self.manifold = self.evaluate(shape_a, xf_a, shape_b, xf_b);
            self.touching = self.manifold.count > 0;

            for i in 0..self.manifold.count {
                let mp = &mut self.manifold.points[i];
                mp.normal_impulse = 0.0;
                mp.tangent_impulse = 0.0;
                for j in 0..old_manifold.count {
                    let old = &old_manifold.points[j];
                    if old.id == mp.id {
                        mp.normal_impulse = old.normal_impulse;
                        mp.tangent_impulse = old.tangent_impulse;
                        break;
                    }
                }
            }
        }

        // New and broken contacts invalidate any cached TOI.
        if self.touching != was_touching {
            self.toi_valid = false;
        }

        ContactUpdate {
            began: !was_touching && self.touching,
            ended: was_touching && !self.touching,
            old_manifold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_orders_polygon_first() {
        let circle = Shape::circle(1.0);
        let polygon = Shape::rect(1.0, 1.0);
        let (kind, swap) = ContactKind::classify(&circle, &polygon);
        assert_eq!(kind, ContactKind::PolygonCircle);
        assert!(swap);

        let (kind, swap) = ContactKind::classify(&polygon, &circle);
        assert_eq!(kind, ContactKind::PolygonCircle);
        assert!(!swap);
    }

    #[test]
    fn classify_orders_edge_before_circle() {
        let circle = Shape::circle(1.0);
        let edge = Shape::edge(glam::Vec2::new(-1.0, 0.0), glam::Vec2::new(1.0, 0.0));
        let (kind, swap) = ContactKind::classify(&circle, &edge);
        assert_eq!(kind, ContactKind::EdgeCircle);
        assert!(swap);
    }
}

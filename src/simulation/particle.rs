use serde::{Deserialize, Serialize};

use crate::{V3, floating_type_mod::FT};

/// Upper bound of particle-particle and particle-surface links a single particle can hold.
pub const MAX_LINKS: usize = 4;

/// Fixed-capacity inline storage. `push` refuses to overflow instead of growing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedSlots<T: Copy + Default, const N: usize> {
    items: [T; N],
    len: u8,
}

impl<T: Copy + Default, const N: usize> Default for BoundedSlots<T, N> {
    fn default() -> Self {
        BoundedSlots {
            items: [T::default(); N],
            len: 0,
        }
    }
}

impl<T: Copy + Default, const N: usize> BoundedSlots<T, N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Returns `false` (and drops `item`) if all slots are occupied.
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.items[self.len()] = item;
        self.len += 1;
        true
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.as_slice().iter()
    }

    /// Keeps the elements for which `keep` returns true, preserving their order.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        let len = self.len();
        let mut w = 0;
        for r in 0..len {
            let item = self.items[r];
            if keep(&item) {
                self.items[w] = item;
                w += 1;
            }
        }
        for slot in &mut self.items[w..len] {
            *slot = T::default();
        }
        self.len = w as u8;
    }

    pub fn clear(&mut self) {
        self.items = [T::default(); N];
        self.len = 0;
    }
}

/// Bond between the owning particle and a point on a collider, stored in the collider's local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceLink {
    pub point: V3,
    pub collider: u32,
    pub face: u32,
}

impl Default for SurfaceLink {
    fn default() -> Self {
        SurfaceLink {
            point: V3::zeros(),
            collider: 0,
            face: 0,
        }
    }
}

impl SurfaceLink {
    pub fn contact_key(&self) -> (u32, u32) {
        (self.collider, self.face)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: V3,
    pub velocity: V3,
    /// scratch, rebuilt every substep
    pub force: V3,
    pub grid_cell: u32,
    // only the bond passes write these, so links stay symmetric and never point at the owner
    pub(crate) links: BoundedSlots<u32, MAX_LINKS>,
    pub(crate) surface_links: BoundedSlots<SurfaceLink, MAX_LINKS>,
}

impl Particle {
    pub fn at(position: V3) -> Self {
        Particle {
            position,
            velocity: V3::zeros(),
            force: V3::zeros(),
            grid_cell: 0,
            links: BoundedSlots::new(),
            surface_links: BoundedSlots::new(),
        }
    }

    /// Indices of the linked particles.
    pub fn linked_particles(&self) -> &[u32] {
        self.links.as_slice()
    }

    pub fn surface_contacts(&self) -> &[SurfaceLink] {
        self.surface_links.as_slice()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn surface_link_count(&self) -> usize {
        self.surface_links.len()
    }

    pub fn is_linked_to(&self, j: u32) -> bool {
        self.links.iter().any(|&l| l == j)
    }

    pub fn has_surface_link(&self, collider: u32, face: u32) -> bool {
        self.surface_links.iter().any(|s| s.contact_key() == (collider, face))
    }

    pub fn kinetic_energy(&self, mass: FT) -> FT {
        0.5 * mass * self.velocity.norm_squared()
    }
}

#[test]
fn test_bounded_slots_refuse_when_full() {
    let mut slots = BoundedSlots::<u32, 4>::new();
    for i in 0..4 {
        assert!(slots.push(i));
    }
    assert!(slots.is_full());
    assert!(!slots.push(99));
    assert_eq!(slots.as_slice(), &[0, 1, 2, 3]);
}

#[test]
fn test_bounded_slots_retain_keeps_order() {
    let mut slots = BoundedSlots::<u32, 4>::new();
    for i in [7, 3, 9, 1] {
        slots.push(i);
    }
    slots.retain(|&x| x != 3 && x != 1);
    assert_eq!(slots.as_slice(), &[7, 9]);
    assert_eq!(slots.len(), 2);
    assert!(slots.push(5));
    assert_eq!(slots.as_slice(), &[7, 9, 5]);

    slots.clear();
    assert!(slots.is_empty());
}

#[test]
fn test_bounded_slots_retain_resets_vacated_slots() {
    let mut slots = BoundedSlots::<u32, 4>::new();
    for i in [4, 8, 15, 16] {
        slots.push(i);
    }
    slots.retain(|&x| x == 8);

    let mut expected = BoundedSlots::<u32, 4>::new();
    expected.push(8);
    assert_eq!(slots, expected);

    slots.retain(|_| false);
    assert_eq!(slots, BoundedSlots::new());
}

#[test]
fn test_particle_exposes_links_read_only() {
    let mut p = Particle::at(V3::zeros());
    p.links.push(3);
    p.surface_links.push(SurfaceLink {
        point: V3::zeros(),
        collider: 1,
        face: 5,
    });
    assert_eq!(p.linked_particles(), &[3]);
    assert_eq!(p.surface_contacts()[0].contact_key(), (1, 5));
    assert!(p.is_linked_to(3));
    assert!(p.has_surface_link(1, 5));
}

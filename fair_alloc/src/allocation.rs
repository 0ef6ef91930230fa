use rand::Rng;

use crate::error::AllocError;

/// Owner of every item. `owner(j)` is a 0-based person index in `[0, persons)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    owners: Vec<usize>,
    persons: usize,
}

impl Allocation {
    /// Validate and wrap 0-based owners
    pub fn new(owners: Vec<usize>, persons: usize) -> Result<Self, AllocError> {
        if let Some((item, &owner)) = owners.iter().enumerate().find(|(_, &o)| o >= persons) {
            return Err(AllocError::InvalidAllocation {
                item,
                owner,
                persons,
            });
        }
        Ok(Allocation { owners, persons })
    }

    /// Convert 1-based owners (the convention at the caller boundary) to an allocation
    pub fn from_one_based(owners: &[usize], persons: usize) -> Result<Self, AllocError> {
        let converted = owners
            .iter()
            .enumerate()
            .map(|(item, &owner)| {
                if owner == 0 || owner > persons {
                    Err(AllocError::InvalidBoundaryOwner {
                        item,
                        owner,
                        persons,
                    })
                } else {
                    Ok(owner - 1)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Allocation {
            owners: converted,
            persons,
        })
    }

    /// Each of `items` items goes to an independent uniform draw over `[0, persons)`
    pub fn random<R: Rng>(items: usize, persons: usize, rng: &mut R) -> Self {
        let owners = if persons == 0 {
            Vec::new()
        } else {
            (0..items).map(|_| rng.random_range(0..persons)).collect()
        };
        Allocation { owners, persons }
    }

    /// Every item to a single person
    pub fn all_to(person: usize, items: usize, persons: usize) -> Result<Self, AllocError> {
        Self::new(vec![person; items], persons)
    }

    /// Owners in the 1-based boundary convention
    pub fn to_one_based(&self) -> Vec<usize> {
        self.owners.iter().map(|o| o + 1).collect()
    }

    pub fn owners(&self) -> &[usize] {
        &self.owners
    }

    #[inline]
    pub fn owner(&self, item: usize) -> usize {
        self.owners[item]
    }

    pub fn items(&self) -> usize {
        self.owners.len()
    }

    pub fn persons(&self) -> usize {
        self.persons
    }

    /// Give `item` to `new_owner`, returning the previous owner
    pub fn reassign(&mut self, item: usize, new_owner: usize) -> usize {
        debug_assert!(new_owner < self.persons);
        std::mem::replace(&mut self.owners[item], new_owner)
    }

    /// Items held by `person`
    pub fn bundle(&self, person: usize) -> Vec<usize> {
        self.owners
            .iter()
            .enumerate()
            .filter(|(_, &o)| o == person)
            .map(|(item, _)| item)
            .collect()
    }

    /// Number of items held by each person
    pub fn bundle_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.persons];
        for &owner in &self.owners {
            sizes[owner] += 1;
        }
        sizes
    }

    /// Person reached from `owner` by stepping `offset` places round the circle
    #[inline]
    pub fn rotated_owner(owner: usize, offset: usize, persons: usize) -> usize {
        (owner + offset) % persons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_rejects_out_of_range_owner() {
        let err = Allocation::new(vec![0, 1, 2], 2).unwrap_err();
        assert_eq!(
            err,
            AllocError::InvalidAllocation {
                item: 2,
                owner: 2,
                persons: 2
            }
        );
    }

    #[test]
    fn test_one_based_round_trip_shifts_indices() {
        let alloc = Allocation::from_one_based(&[1, 3, 2, 3], 3).unwrap();
        assert_eq!(alloc.owners(), &[0, 2, 1, 2]);
        assert_eq!(alloc.to_one_based(), vec![1, 3, 2, 3]);
    }

    #[test]
    fn test_one_based_rejects_zero_and_overflow() {
        assert!(matches!(
            Allocation::from_one_based(&[1, 0], 2),
            Err(AllocError::InvalidBoundaryOwner { item: 1, owner: 0, .. })
        ));
        assert!(matches!(
            Allocation::from_one_based(&[3], 2),
            Err(AllocError::InvalidBoundaryOwner { item: 0, owner: 3, .. })
        ));
    }

    #[test]
    fn test_random_allocation_covers_all_persons() {
        let mut rng = StdRng::seed_from_u64(42);
        let alloc = Allocation::random(1000, 4, &mut rng);
        assert_eq!(alloc.items(), 1000);
        let sizes = alloc.bundle_sizes();
        assert_eq!(sizes.iter().sum::<usize>(), 1000);
        // Each person should receive roughly a quarter of the items
        assert!(sizes.iter().all(|&s| s > 150 && s < 350), "{:?}", sizes);
    }

    #[test]
    fn test_reassign_returns_previous_owner() {
        let mut alloc = Allocation::all_to(0, 3, 2).unwrap();
        assert_eq!(alloc.reassign(1, 1), 0);
        assert_eq!(alloc.owners(), &[0, 1, 0]);
        assert_eq!(alloc.bundle(0), vec![0, 2]);
        assert_eq!(alloc.bundle(1), vec![1]);
    }

    #[test]
    fn test_rotated_owner_never_returns_current_for_valid_offset() {
        let persons = 5;
        for owner in 0..persons {
            for offset in 1..persons {
                let next = Allocation::rotated_owner(owner, offset, persons);
                assert_ne!(next, owner);
                assert!(next < persons);
            }
        }
    }
}

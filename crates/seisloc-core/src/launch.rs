//! Dispatch sizing for data-parallel launches.
//!
//! Kernels are written against a flat work-item range with an out-of-range
//! guard, while devices dispatch workgroups over up to three dimensions
//! with a bounded per-dimension count. `LaunchGrid` folds a flat item count
//! into an `(x, y)` workgroup grid and tells the kernel the stride it needs
//! to rebuild its linear id.

/// Workgroup size every seisloc kernel is compiled with.
pub const WORKGROUP_SIZE: u32 = 64;

/// Maximum workgroups a device accepts along one dispatch dimension.
pub const MAX_GROUPS_PER_DIM: u32 = 65_535;

/// A 2-D workgroup grid covering a flat work-item range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGrid {
    /// Work items the kernel must guard against exceeding.
    pub items: u32,
    /// Workgroups along x.
    pub groups_x: u32,
    /// Workgroups along y.
    pub groups_y: u32,
}

impl LaunchGrid {
    /// Smallest grid covering `items` work items.
    pub fn for_items(items: usize) -> Self {
        let items = u32::try_from(items).expect("work-item count exceeds device range");
        let groups = items.div_ceil(WORKGROUP_SIZE).max(1);
        let groups_x = groups.min(MAX_GROUPS_PER_DIM);
        let groups_y = groups.div_ceil(groups_x);
        Self {
            items,
            groups_x,
            groups_y,
        }
    }

    /// Linear-id stride of one y-row of workgroups: a work item at
    /// invocation `(gx, gy)` has linear id `gy * row_stride + gx`.
    #[inline]
    pub fn row_stride(&self) -> u32 {
        self.groups_x * WORKGROUP_SIZE
    }

    /// Total invocations the grid launches (at least `items`).
    #[inline]
    pub fn invocations(&self) -> u64 {
        u64::from(self.groups_x) * u64::from(self.groups_y) * u64::from(WORKGROUP_SIZE)
    }
}

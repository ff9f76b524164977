/// Identifies a cluster on disk.
///
/// A cluster is a consecutive group of blocks. Each cluster has a unique
/// identifier. Clusters 0 and 1 do not exist on disk, data starts at
/// cluster 2.
///
/// Cluster 0 doubles as the name of the root directory, which is also what
/// a `..` entry inside a top-level directory stores. A file with no data
/// yet also has cluster 0.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub u32);

impl ClusterId {
    /// Magic value indicating an invalid cluster value.
    pub const INVALID: ClusterId = ClusterId(0xFFFF_FFF6);
    /// Magic value indicating the cluster holding the root directory.
    pub const ROOT_DIR: ClusterId = ClusterId(0);

    pub fn is_root(self) -> bool {
        self == Self::ROOT_DIR
    }
}


//! Repository traits for replica state persistence.

pub mod files;
pub mod replica_files;
pub mod replicas;

pub use files::FileRepo;
pub use replica_files::ReplicaFileRepo;
pub use replicas::ReplicaRepo;

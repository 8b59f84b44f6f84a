//! Build cache persistence
//!
//! Two cooperating pieces: content-addressed dependency layers inside a
//! store (`layer`), and the store lifecycle itself (`store`) — restore at
//! pipeline start, build into a staging copy, promote after publish. Stores
//! travel between runs through a key-value blob interface (`remote`).
//!
//! # Cache States
//!
//! | State | Trusted | Description |
//! |-------|---------|-------------|
//! | absent | - | No directory, cold start |
//! | unmarked | no | Directory without completion marker, treated as absent |
//! | complete | yes | Marker present, contents valid by construction |

pub mod layer;
pub mod remote;
pub mod store;

pub use layer::{DependencyCacheLayer, LayerState};
pub use remote::{BlobStore, FsBlobStore};
pub use store::{is_valid_store, RestoreOutcome, Rotator, StoreKey, StorePaths};

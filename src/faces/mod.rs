pub mod detector;
pub mod enroll;
pub mod gallery;
pub mod matcher;
pub mod providers;
pub mod remote;

pub use detector::{BoundingBox, FaceEmbedder, Observation, OnnxEmbedder};
pub use enroll::enroll_from_image;
pub use gallery::{Gallery, GalleryCache};
pub use matcher::{MatchResult, Matcher, UNKNOWN_LABEL};
pub use remote::RemoteEmbedder;

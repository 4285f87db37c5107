mod model;
mod schema;

pub use model::{CameraIntrinsics, FrameRecord, Manifest, IMAGES_DIR, MANIFEST_FILE_NAME};
pub use schema::ManifestProfile;

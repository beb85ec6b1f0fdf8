pub const DEFAULT_MODEL_NAME: &str = "seeta_fd_frontal_v1.0.bin";
pub const DEFAULT_MODEL_URI: &str = concat!(
    "https://github.com/atomashpolskiy/rustface/raw/master/model/",
    "seeta_fd_frontal_v1.0.bin#seeta_fd_frontal_v1.0.bin"
);

/// Every partial count is emitted under this key, so the reduce stage sees a single group.
pub const FACE_COUNT_KEY: u32 = 1;

pub const RESULT_LABEL: &str = "Total face detected";

pub const OUTPUT_PART_FILE: &str = "part-r-00000";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Images per input split when neither the CLI nor the config file says otherwise.
pub const DEFAULT_SPLIT_SIZE: usize = 64;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

mod data_url;
mod slots;

pub use data_url::{decode_data_url, encode_data_url, split_data_url, DataUrlParts};
pub use slots::{NotAnImage, UploadSlot, UploadedImage, PORTRAIT_CAPACITY, PRODUCT_CAPACITY};

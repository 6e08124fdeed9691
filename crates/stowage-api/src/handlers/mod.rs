pub mod direct_upload;
pub mod public_asset;
pub mod uploads;

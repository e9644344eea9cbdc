//! Exif tag identifiers.
//!
//! A tag id carries the directory it lives in within its upper 16 bits,
//! so mutation helpers can route a tag to the right directory without a
//! separate argument.

/// Directory selector bits.
pub const DIR_TIFF: u32 = 0x0000_0000;
pub const DIR_EXIF: u32 = 0x0001_0000;
pub const DIR_GPS: u32 = 0x0002_0000;
pub const DIR_INTEROP: u32 = 0x0003_0000;

const DIR_MASK: u32 = 0xFFFF_0000;

/// Splits a tag id into its directory selector and 16-bit tag number.
pub fn split(id: u32) -> (u32, u16) {
    (id & DIR_MASK, id as u16)
}

// IFD0 (TIFF) tags
pub const IMAGE_WIDTH: u32 = DIR_TIFF | 0x0100;
pub const IMAGE_LENGTH: u32 = DIR_TIFF | 0x0101;
pub const MAKE: u32 = DIR_TIFF | 0x010F;
pub const MODEL: u32 = DIR_TIFF | 0x0110;
pub const ORIENTATION: u32 = DIR_TIFF | 0x0112;
pub const X_RESOLUTION: u32 = DIR_TIFF | 0x011A;
pub const Y_RESOLUTION: u32 = DIR_TIFF | 0x011B;
pub const RESOLUTION_UNIT: u32 = DIR_TIFF | 0x0128;
pub const DATE_TIME: u32 = DIR_TIFF | 0x0132;

// reserved sub-IFD pointer tags within IFD0
pub const EXIF_IFD_POINTER: u16 = 0x8769;
pub const GPS_IFD_POINTER: u16 = 0x8825;
pub const INTEROP_IFD_POINTER: u16 = 0xA005;

// IFD1 thumbnail tags
pub const THUMB_OFFSET: u16 = 0x0201;
pub const THUMB_LENGTH: u16 = 0x0202;

// Exif sub-IFD tags
pub const EXIF_VERSION: u32 = DIR_EXIF | 0x9000;
pub const DATE_TIME_ORIGINAL: u32 = DIR_EXIF | 0x9003;
pub const DATE_TIME_DIGITIZED: u32 = DIR_EXIF | 0x9004;
pub const COMPONENTS_CONFIGURATION: u32 = DIR_EXIF | 0x9101;
pub const SUB_SEC_TIME: u32 = DIR_EXIF | 0x9290;
pub const SUB_SEC_TIME_ORIGINAL: u32 = DIR_EXIF | 0x9291;
pub const SUB_SEC_TIME_DIGITIZED: u32 = DIR_EXIF | 0x9292;
pub const FLASHPIX_VERSION: u32 = DIR_EXIF | 0xA000;
pub const COLOR_SPACE: u32 = DIR_EXIF | 0xA001;
pub const PIXEL_X_DIMENSION: u32 = DIR_EXIF | 0xA002;
pub const PIXEL_Y_DIMENSION: u32 = DIR_EXIF | 0xA003;
pub const YCBCR_POSITIONING: u32 = DIR_EXIF | 0x0213;

// GPS sub-IFD tags
pub const GPS_VERSION_ID: u32 = DIR_GPS;
pub const GPS_LATITUDE_REF: u32 = DIR_GPS | 0x0001;
pub const GPS_LATITUDE: u32 = DIR_GPS | 0x0002;
pub const GPS_LONGITUDE_REF: u32 = DIR_GPS | 0x0003;
pub const GPS_LONGITUDE: u32 = DIR_GPS | 0x0004;
pub const GPS_TIME_STAMP: u32 = DIR_GPS | 0x0007;
pub const GPS_DATE_STAMP: u32 = DIR_GPS | 0x001D;

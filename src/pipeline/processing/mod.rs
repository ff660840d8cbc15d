// Pipeline processing: header translation, address merge, validation, dedupe

pub mod address;
pub mod dedupe;
pub mod email;
pub mod headers;

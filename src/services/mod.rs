//! Service layer separating I/O and encoding from the pixel pipeline

pub mod format;
pub mod io;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;

pub mod crop;
pub mod image_io;
pub mod sequence;
pub mod ser;
pub mod ser_writer;
pub mod source;

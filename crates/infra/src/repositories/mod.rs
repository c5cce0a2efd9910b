mod emergency;

pub use emergency::*;

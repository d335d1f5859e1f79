pub mod calibration;
pub mod combine;
pub mod consts;
pub mod correct;
pub mod error;
pub mod frame;
pub mod index;
pub mod io;
pub mod organize;
pub mod pipeline;
pub mod register;
pub mod stack;

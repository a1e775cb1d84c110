#![no_std]

pub mod devices;
pub mod env;
pub mod ioctl;

#![no_std]

pub mod config;
pub mod irq_flag;
pub mod klog;

#[doc(hidden)]
pub use paste;

pub use config::{NetConfig, config_from_cmdline};
pub use irq_flag::IrqFlag;
pub use klog::{
    KlogLevel, klog_get_level, klog_is_enabled, klog_register_backend, klog_set_level,
    klog_unregister_backend,
};

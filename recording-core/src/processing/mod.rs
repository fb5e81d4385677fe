pub mod compositor;
pub mod yuv;

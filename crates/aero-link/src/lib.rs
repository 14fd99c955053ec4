pub mod assemble;
pub mod command_link;
pub mod doctor;
pub mod video_link;

pub use command_link::CommandLink;
pub use video_link::VideoLink;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Vehicle IP on its own WiFi network (192.168.10.1 on the reference
    /// hardware).
    pub addr: String,
    pub command_port: u16,

    /// Local port acknowledgements arrive on. 0 picks an ephemeral port.
    pub local_port: u16,
}

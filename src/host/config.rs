/// Host configuration. Missing fields take their default values when
/// deserialized.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// GAP Device Name, stored with a NUL terminator.
    pub device_name: String,
    /// Maximum ATT_MTU accepted by the server.
    pub max_mtu: u16,
    /// Whether peer security requests are granted. Can be changed at runtime
    /// with [`super::Host::set_pairing_allowed`].
    pub pairing_allowed: bool,
    /// Whether numeric comparison is accepted when the device has no
    /// confirmation input.
    pub auto_accept_numeric_comparison: bool,
    /// Include the Fast Pair service and consult the Fast Pair provider.
    pub fast_pair: bool,
    /// Include the firmware upgrade service.
    pub ota: bool,
    /// Response buffer pool budget in bytes.
    pub buf_pool_size: usize,
    /// Value after which the battery level wraps to 0.
    pub battery_ceiling: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: "HSPK LE".to_owned(),
            max_mtu: 365,
            pairing_allowed: false,
            auto_accept_numeric_comparison: true,
            fast_pair: false,
            ota: false,
            buf_pool_size: 7 * 1024,
            battery_ceiling: 5,
        }
    }
}

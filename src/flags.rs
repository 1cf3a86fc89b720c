use bitflags::bitflags;

bitflags! {
    /// Valid flags for a DATA frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataFlags: u8 {
        /// `0x01`: FLAG_FIN
        const FIN = 0x01;
    }
}

bitflags! {
    /// Valid flags for a SYN_STREAM frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SynStreamFlags: u8 {
        /// `0x01`: FLAG_FIN
        const FIN            = 0x01;
        /// `0x02`: FLAG_UNIDIRECTIONAL
        const UNIDIRECTIONAL = 0x02;
    }
}

bitflags! {
    /// Valid flags for a SYN_REPLY frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SynReplyFlags: u8 {
        /// `0x01`: FLAG_FIN
        const FIN = 0x01;
    }
}

bitflags! {
    /// Valid flags for a HEADERS frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeadersFlags: u8 {
        /// `0x01`: FLAG_FIN
        const FIN = 0x01;
    }
}

bitflags! {
    /// Valid flags for a SETTINGS frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SettingsFlags: u8 {
        /// `0x01`: FLAG_SETTINGS_CLEAR_SETTINGS
        const CLEAR_SETTINGS = 0x01;
    }
}

bitflags! {
    /// Valid flags for a single ID/value entry inside a SETTINGS frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SettingEntryFlags: u8 {
        /// `0x01`: FLAG_SETTINGS_PERSIST_VALUE
        const PERSIST_VALUE = 0x01;
        /// `0x02`: FLAG_SETTINGS_PERSISTED
        const PERSISTED     = 0x02;
    }
}

bitflags! {
    /// Valid flags for a RST_STREAM frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RstStreamFlags: u8 { }
}

bitflags! {
    /// Valid flags for a PING frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PingFlags: u8 { }
}

bitflags! {
    /// Valid flags for a GOAWAY frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GoAwayFlags: u8 { }
}

bitflags! {
    /// Valid flags for a WINDOW_UPDATE frame
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowUpdateFlags: u8 { }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitflags() {
        let flag = SynStreamFlags::from_bits(2);

        assert_eq!(Some(SynStreamFlags::UNIDIRECTIONAL), flag);
    }

    #[test]
    fn test_setting_entry_flags() {
        let both = SettingEntryFlags::PERSIST_VALUE | SettingEntryFlags::PERSISTED;

        assert_eq!(both.bits(), 0x03);
        assert!(both.contains(SettingEntryFlags::PERSISTED));
    }
}

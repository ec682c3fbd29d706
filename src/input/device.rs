//! Device classes, the name-matching table and default button layouts.
//!
//! Classification is purely declarative: [`DEVICE_RULES`] is evaluated top to
//! bottom and the first rule whose substrings are all contained in the device
//! name wins. Vendor rows such as "Microsoft" and "WiseGroup" claim every name
//! they match, so a model without its own row above them stays generic instead
//! of falling through to the rules further down.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::event::{InputSource, KeyCode};

macro_rules! device_classes {
    ($($variant:ident => $name:expr),+ $(,)?) => {
        /// Known controller models. Only used for naming and default bindings.
        #[repr(u8)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum DeviceClass {
            $($variant),+
        }

        impl DeviceClass {
            pub const ALL: &'static [DeviceClass] = &[$(DeviceClass::$variant),+];

            pub fn display_name(self) -> &'static str {
                match self {
                    $(DeviceClass::$variant => $name),+
                }
            }
        }
    };
}

device_classes! {
    Generic => "Generic Gamepad",
    LogitechRumblepad2 => "Logitech RumblePad 2",
    LogitechDualAction => "Logitech Dual Action",
    LogitechPrecision => "Logitech Precision",
    IControlPadHid => "iControlPad HID Joystick",
    IControlPadBluezIme => "iControlpad SPP mode (using Bluez IME)",
    TttThtArcade => "TTT THT Arcade",
    TommoNeogeoxArcade => "TOMMO NEOGEOX Arcade Stick",
    MadcatzPcUsbStick => "MadCatz PC USB Wired Stick",
    LogicoolRumblepad2 => "Logicool RumblePad 2",
    IdroidX360 => "iDroid x360",
    ZeemoteSteelseries => "Zeemote Steelseries",
    HuijiaUsbSnes => "HuiJia USB SNES",
    SuperSmartjoy => "Super Smartjoy 2",
    SaitekRumbleP480 => "Saitek Rumble P480",
    SideWinderDualStrike => "SideWinder Dual Strike",
    SideWinder => "SideWinder",
    MsXbox => "Xbox Controller",
    WisegroupPs2 => "WiseGroup PlayStation2 Adapter",
    Jcps102Ps2 => "JC-PS102U PlayStation2 Adapter",
    GenericPs2Converter => "PlayStation2 Converter",
    PsMoveNavi => "PS Move Navigation",
    JxdS7300b => "JXD S7300B",
    JxdS7800b => "JXD S7800B",
    IdroidCon => "i.droid:con",
    GeniusMaxfireG08xu => "Genius Maxfire G-08XU",
    Usb2Axis8Button => "USB 2-Axis 8-Button Gamepad",
    BuffaloBgcFc801 => "Buffalo BGC-FC801",
    RetroUsbRetropad => "RetroUSB RetroPad",
    RetroUsbSnesRetroport => "RetroUSB SNES RetroPort",
    CypressUsb => "Cypress USB",
    MayflashWiiClassic => "Mayflash Wii Classic",
    SzmyPowerDualBoxWii => "SZMy-power Dual Box Wii",
    ArchosGamepad => "Archos Gamepad",
    JxdS5110 => "JXD S5110",
    JxdS5110Skelrom => "JXD S5110 (SkelROM)",
    XperiaPlay => "Xperia Play",
    BroadcomBluetoothHid => "Broadcom Bluetooth HID",
    ThrustPredator => "Thrust Predator",
    DragonRise => "DragonRise",
    Ps3Version1 => "PlayStation 3 (Gamepad)",
    Ps3Version2 => "PlayStation 3",
    MogaIme => "MOGA IME",
    NykoPlaypadPro => "Nyko Playpad Pro",
    Toodles2008Chimp => "Toodles 2008 ChImp",
    Moga => "MOGA",
    SegaVirtuaStick => "SEGA Virtua Stick High Grade",
    CcpcreationsWiiUseIme => "ccpcreations WiiUse",
    KeyboardRetropad => "Keyboard RetroPad",
    Ouya => "OUYA",
    OnliveWireless => "OnLive Wireless Controller",
    TomeeNesUsb => "Tomee NES USB",
    ThrustmasterTMini => "Thrustmaster T Mini",
    GameMid => "GameMID",
    DefenderGameRacerClassic => "Defender Game Racer Classic",
    HoltekJcU912f => "Holtek JC-U912F",
    NvidiaShield => "NVIDIA Shield",
    MuchIreadgoI5 => "MUCH iReadyGo i5",
    Wikipad => "Wikipad",
    Fc30Gamepad => "8Bitdo FC30",
    SamsungGamepadEigp20 => "Samsung EI-GP20",
}

impl Default for DeviceClass {
    fn default() -> Self {
        DeviceClass::Generic
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl DeviceClass {
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> DeviceClass {
        DeviceClass::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(DeviceClass::Generic)
    }

    /// Handhelds that report one physical pad under two platform ids.
    pub fn is_split_identity(self) -> bool {
        matches!(self, DeviceClass::XperiaPlay)
    }

    pub fn layout(self) -> BindLayout {
        match self {
            DeviceClass::XperiaPlay => BindLayout::XperiaPlay,
            DeviceClass::Usb2Axis8Button
            | DeviceClass::GeniusMaxfireG08xu
            | DeviceClass::HuijiaUsbSnes
            | DeviceClass::DragonRise
            | DeviceClass::WisegroupPs2
            | DeviceClass::Jcps102Ps2
            | DeviceClass::GenericPs2Converter => BindLayout::Numbered,
            DeviceClass::KeyboardRetropad => BindLayout::Keyboard,
            _ => BindLayout::Standard,
        }
    }
}

/// Name fragments of the split-identity keypad. Both of its ids carry one.
pub const SPLIT_IDENTITY_NAMES: &[&str] = &["keypad-zeus", "keypad-game-zeus"];

pub fn is_split_identity_name(name: &str) -> bool {
    SPLIT_IDENTITY_NAMES.iter().any(|fragment| name.contains(fragment))
}

/// One row of the classification table.
#[derive(Clone, Copy, Debug)]
pub struct DeviceRule {
    /// Every pattern must be contained (case-sensitive) in the device name.
    pub patterns: &'static [&'static str],
    /// `Generic` marks a vendor row that claims the name without knowing the model.
    pub class: DeviceClass,
    /// Primary devices are forced onto port 0.
    pub primary: bool,
    /// Replaces the platform name in the per-port name buffer.
    pub name: Option<&'static str>,
}

const fn rule(patterns: &'static [&'static str], class: DeviceClass) -> DeviceRule {
    DeviceRule {
        patterns,
        class,
        primary: false,
        name: None,
    }
}

const fn primary(patterns: &'static [&'static str], class: DeviceClass, name: &'static str) -> DeviceRule {
    DeviceRule {
        patterns,
        class,
        primary: true,
        name: Some(name),
    }
}

const fn vendor(pattern: &'static [&'static str]) -> DeviceRule {
    rule(pattern, DeviceClass::Generic)
}

pub const DEVICE_RULES: &[DeviceRule] = &[
    rule(&["Logitech", "RumblePad 2"], DeviceClass::LogitechRumblepad2),
    rule(&["Logitech", "Dual Action"], DeviceClass::LogitechDualAction),
    rule(&["Logitech", "Precision"], DeviceClass::LogitechPrecision),
    // followed by a 4 char hex hardware id
    rule(&["iControlPad-"], DeviceClass::IControlPadHid),
    rule(&["SEGA VIRTUA STICK High Grade"], DeviceClass::SegaVirtuaStick),
    rule(&["TTT THT Arcade console 2P USB Play"], DeviceClass::TttThtArcade),
    rule(&["TOMMO NEOGEOX Arcade Stick"], DeviceClass::TommoNeogeoxArcade),
    rule(&["Onlive Wireless Controller"], DeviceClass::OnliveWireless),
    rule(&["MadCatz", "PC USB Wired Stick"], DeviceClass::MadcatzPcUsbStick),
    rule(&["Logicool", "RumblePad 2"], DeviceClass::LogicoolRumblepad2),
    rule(&["Sun4i-keypad"], DeviceClass::IdroidX360),
    rule(&["Zeemote", "Steelseries free"], DeviceClass::ZeemoteSteelseries),
    rule(&["HuiJia  USB GamePad"], DeviceClass::HuijiaUsbSnes),
    rule(&["Smartjoy Family Super Smartjoy 2"], DeviceClass::SuperSmartjoy),
    rule(&["Jess Tech Dual Analog Rumble Pad"], DeviceClass::SaitekRumbleP480),
    rule(&["mtk-kpd"], DeviceClass::MuchIreadgoI5),
    rule(&["Wikipad"], DeviceClass::Wikipad),
    rule(&["Microsoft", "Dual Strike"], DeviceClass::SideWinderDualStrike),
    rule(&["Microsoft", "SideWinder"], DeviceClass::SideWinder),
    rule(&["Microsoft", "X-Box"], DeviceClass::MsXbox),
    rule(&["Microsoft", "Xbox 360 Wireless Receiver"], DeviceClass::MsXbox),
    vendor(&["Microsoft"]),
    rule(&["WiseGroup", "TigerGame"], DeviceClass::WisegroupPs2),
    rule(&["WiseGroup", "Game Controller Adapter"], DeviceClass::WisegroupPs2),
    rule(&["WiseGroup", "JC-PS102U"], DeviceClass::WisegroupPs2),
    rule(&["WiseGroup", "Dual USB Joypad"], DeviceClass::WisegroupPs2),
    vendor(&["WiseGroup"]),
    rule(&["Gamepad 0"], DeviceClass::Ps3Version1),
    rule(&["Gamepad 1"], DeviceClass::Ps3Version1),
    rule(&["Gamepad 2"], DeviceClass::Ps3Version1),
    rule(&["Gamepad 3"], DeviceClass::Ps3Version1),
    rule(&["PLAYSTATION(R)3"], DeviceClass::Ps3Version2),
    rule(&["Dualshock3"], DeviceClass::Ps3Version2),
    rule(&["Sixaxis"], DeviceClass::Ps3Version2),
    rule(&["Gasia,Co"], DeviceClass::Ps3Version2),
    rule(&["MOGA"], DeviceClass::Moga),
    rule(&["Sony Navigation Controller"], DeviceClass::PsMoveNavi),
    rule(&["OUYA Game Controller"], DeviceClass::Ouya),
    rule(&["adc joystick"], DeviceClass::JxdS7300b),
    rule(&["idroid:con"], DeviceClass::IdroidCon),
    rule(&["NYKO PLAYPAD PRO"], DeviceClass::NykoPlaypadPro),
    rule(&["2-Axis, 8-Button"], DeviceClass::GeniusMaxfireG08xu),
    rule(&["USB,2-axis 8-button gamepad"], DeviceClass::Usb2Axis8Button),
    rule(&["BUFFALO BGC-FC801"], DeviceClass::BuffaloBgcFc801),
    rule(&["8Bitdo FC30"], DeviceClass::Fc30Gamepad),
    rule(&["RetroUSB.com RetroPad"], DeviceClass::RetroUsbRetropad),
    rule(&["RetroUSB.com SNES RetroPort"], DeviceClass::RetroUsbSnesRetroport),
    rule(&["CYPRESS USB"], DeviceClass::CypressUsb),
    rule(&["Mayflash Wii Classic"], DeviceClass::MayflashWiiClassic),
    rule(&["SZMy-power LTD CO.  Dual Box WII"], DeviceClass::SzmyPowerDualBoxWii),
    rule(&["Toodles 2008 ChImp"], DeviceClass::Toodles2008Chimp),
    rule(&["joy_key"], DeviceClass::ArchosGamepad),
    rule(&["matrix_keyboard"], DeviceClass::JxdS5110),
    rule(&["tincore_adc_joystick"], DeviceClass::JxdS5110Skelrom),
    rule(&["keypad-zeus"], DeviceClass::XperiaPlay),
    rule(&["keypad-game-zeus"], DeviceClass::XperiaPlay),
    rule(&["Broadcom Bluetooth HID"], DeviceClass::BroadcomBluetoothHid),
    rule(&["USB Gamepad"], DeviceClass::ThrustPredator),
    rule(&["ADC joystick"], DeviceClass::JxdS7800b),
    rule(&["DragonRise"], DeviceClass::DragonRise),
    rule(&["Thrustmaster T Mini"], DeviceClass::ThrustmasterTMini),
    rule(&["2Axes 11Keys Game  Pad"], DeviceClass::TomeeNesUsb),
    rule(&["rk29-keypad"], DeviceClass::GameMid),
    rule(&["GAMEMID"], DeviceClass::GameMid),
    // Shadowed by the Thrust Predator row; both pads report the same name.
    rule(&["USB Gamepad"], DeviceClass::DefenderGameRacerClassic),
    rule(&["HOLTEK JC - U912F vibration game"], DeviceClass::HoltekJcU912f),
    primary(&["NVIDIA Controller"], DeviceClass::NvidiaShield, "NVIDIA Shield"),
    rule(&["Samsung Game Pad EI-GP20"], DeviceClass::SamsungGamepadEigp20),
];

/// Software remapper identified by the active input method.
#[derive(Clone, Copy, Debug)]
pub struct InputMethodRemapper {
    /// Contained in the input method id.
    pub id: &'static str,
    pub class: DeviceClass,
    pub name: &'static str,
}

/// Checked in order; the first remapper whose id is part of the active input
/// method replaces whatever the name table produced.
pub const INPUT_METHOD_REMAPPERS: &[InputMethodRemapper] = &[
    InputMethodRemapper {
        id: "net.obsidianx.android.mogaime",
        class: DeviceClass::MogaIme,
        name: "MOGA IME",
    },
    InputMethodRemapper {
        id: "com.ccpcreations.android.WiiUseAndroid",
        class: DeviceClass::CcpcreationsWiiUseIme,
        name: "ccpcreations WiiUse",
    },
    InputMethodRemapper {
        id: "com.hexad.bluezime",
        class: DeviceClass::IControlPadBluezIme,
        name: "iControlpad SPP mode (using Bluez IME)",
    },
];

/// Result of classifying a device at hot-plug time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub class: DeviceClass,
    pub primary: bool,
    /// False when neither the name table nor a remapper identified a model.
    pub recognized: bool,
    /// Name to show instead of the platform's device name.
    pub name: Option<&'static str>,
}

impl Classification {
    pub const GENERIC: Classification = Classification {
        class: DeviceClass::Generic,
        primary: false,
        recognized: false,
        name: None,
    };
}

/// First rule whose patterns are all contained in `name`.
pub fn match_rules<'a>(rules: &'a [DeviceRule], name: &str) -> Option<&'a DeviceRule> {
    rules
        .iter()
        .find(|rule| rule.patterns.iter().all(|pattern| name.contains(pattern)))
}

pub fn match_remapper(input_method: &str) -> Option<&'static InputMethodRemapper> {
    INPUT_METHOD_REMAPPERS
        .iter()
        .find(|remapper| input_method.contains(remapper.id))
}

/// Classifies a device from its name, the event source and the active input
/// method.
///
/// Three passes, each able to override the previous one: the name table, the
/// input-method remappers (any source), and finally the keyboard retropad for
/// keyboard-sourced events. The Xperia Play keypad is keyboard-sourced itself
/// and keeps its class.
pub fn classify(name: Option<&str>, source: InputSource, input_method: Option<&str>) -> Classification {
    let mut result = match name.filter(|n| !n.is_empty()).and_then(|n| match_rules(DEVICE_RULES, n)) {
        Some(rule) => Classification {
            class: rule.class,
            primary: rule.primary,
            recognized: rule.class != DeviceClass::Generic,
            name: rule.name,
        },
        None => Classification::GENERIC,
    };

    if let Some(remapper) = input_method.and_then(match_remapper) {
        debug!(
            "Input method {} overrides {:?} with {:?}",
            remapper.id, result.class, remapper.class
        );
        result.class = remapper.class;
        result.name = Some(remapper.name);
        result.recognized = true;
    }

    if source == InputSource::Keyboard && result.class != DeviceClass::XperiaPlay {
        debug!("Keyboard source, {:?} becomes {:?}", result.class, DeviceClass::KeyboardRetropad);
        result.class = DeviceClass::KeyboardRetropad;
        result.recognized = true;
    }

    result
}

/// Logical pad buttons exposed to the emulation core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetroButton {
    B,
    Y,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
    A,
    X,
    L,
    R,
    L2,
    R2,
    L3,
    R3,
}

impl RetroButton {
    pub const COUNT: usize = 16;

    pub const ALL: [RetroButton; RetroButton::COUNT] = [
        RetroButton::B,
        RetroButton::Y,
        RetroButton::Select,
        RetroButton::Start,
        RetroButton::Up,
        RetroButton::Down,
        RetroButton::Left,
        RetroButton::Right,
        RetroButton::A,
        RetroButton::X,
        RetroButton::L,
        RetroButton::R,
        RetroButton::L2,
        RetroButton::R2,
        RetroButton::L3,
        RetroButton::R3,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn mask(self) -> u16 {
        1 << self.index()
    }
}

/// Default button layouts shared by groups of device classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindLayout {
    Standard,
    XperiaPlay,
    Numbered,
    Keyboard,
}

/// Key code bound to each [`RetroButton`], `None` when unbound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binds {
    pub keys: [Option<KeyCode>; RetroButton::COUNT],
}

impl Default for Binds {
    fn default() -> Self {
        Self::for_layout(BindLayout::Standard)
    }
}

impl Binds {
    pub const fn unbound() -> Self {
        Self {
            keys: [None; RetroButton::COUNT],
        }
    }

    pub fn get(&self, button: RetroButton) -> Option<KeyCode> {
        self.keys[button.index()]
    }

    pub fn set(&mut self, button: RetroButton, key: KeyCode) {
        self.keys[button.index()] = Some(key);
    }

    /// Bound pairs in button order.
    pub fn pairs(&self) -> impl Iterator<Item = (RetroButton, KeyCode)> + '_ {
        RetroButton::ALL
            .iter()
            .filter_map(|button| self.get(*button).map(|key| (*button, key)))
    }

    pub fn keyboard() -> Self {
        Self::for_layout(BindLayout::Keyboard)
    }

    pub fn for_class(class: DeviceClass) -> Self {
        Self::for_layout(class.layout())
    }

    pub fn for_layout(layout: BindLayout) -> Self {
        use RetroButton::*;
        let mut binds = Self::unbound();
        binds.set(Up, KeyCode::DPAD_UP);
        binds.set(Down, KeyCode::DPAD_DOWN);
        binds.set(Left, KeyCode::DPAD_LEFT);
        binds.set(Right, KeyCode::DPAD_RIGHT);

        match layout {
            BindLayout::Standard => {
                binds.set(B, KeyCode::BUTTON_A);
                binds.set(A, KeyCode::BUTTON_B);
                binds.set(Y, KeyCode::BUTTON_X);
                binds.set(X, KeyCode::BUTTON_Y);
                binds.set(Select, KeyCode::BUTTON_SELECT);
                binds.set(Start, KeyCode::BUTTON_START);
                binds.set(L, KeyCode::BUTTON_L1);
                binds.set(R, KeyCode::BUTTON_R1);
                binds.set(L2, KeyCode::BUTTON_L2);
                binds.set(R2, KeyCode::BUTTON_R2);
                binds.set(L3, KeyCode::BUTTON_THUMBL);
                binds.set(R3, KeyCode::BUTTON_THUMBR);
            }
            BindLayout::XperiaPlay => {
                binds.set(B, KeyCode::DPAD_CENTER);
                binds.set(A, KeyCode::BACK);
                binds.set(Y, KeyCode::BUTTON_X);
                binds.set(X, KeyCode::BUTTON_Y);
                binds.set(Select, KeyCode::BUTTON_SELECT);
                binds.set(Start, KeyCode::BUTTON_START);
                binds.set(L, KeyCode::BUTTON_L1);
                binds.set(R, KeyCode::BUTTON_R1);
            }
            BindLayout::Numbered => {
                let numbered = |n: u16| KeyCode(KeyCode::BUTTON_1.0 + n - 1);
                binds.set(X, numbered(1));
                binds.set(A, numbered(2));
                binds.set(B, numbered(3));
                binds.set(Y, numbered(4));
                binds.set(L, numbered(5));
                binds.set(R, numbered(6));
                binds.set(L2, numbered(7));
                binds.set(R2, numbered(8));
                binds.set(Select, numbered(9));
                binds.set(Start, numbered(10));
            }
            BindLayout::Keyboard => {
                binds.set(B, KeyCode::Z);
                binds.set(A, KeyCode::X);
                binds.set(Y, KeyCode::A);
                binds.set(X, KeyCode::S);
                binds.set(Select, KeyCode::SHIFT_RIGHT);
                binds.set(Start, KeyCode::ENTER);
                binds.set(L, KeyCode::Q);
                binds.set(R, KeyCode::W);
            }
        }
        binds
    }
}

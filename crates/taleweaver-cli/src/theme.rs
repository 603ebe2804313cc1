use crossterm::style::Color;

#[derive(Clone, Debug)]
pub struct Theme {
    pub name: &'static str,
    pub narration: Color,
    pub prompt: Color,
    pub system: Color,
    pub muted: Color,
    pub error: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark",
            narration: Color::Rgb { r: 220, g: 220, b: 220 },
            prompt: Color::Cyan,
            system: Color::Yellow,
            muted: Color::Rgb { r: 100, g: 100, b: 100 },
            error: Color::Rgb { r: 247, g: 118, b: 142 },
        }
    }

    pub fn tokyo_night() -> Self {
        Self {
            name: "tokyo-night",
            narration: Color::Rgb { r: 169, g: 177, b: 214 },
            prompt: Color::Rgb { r: 122, g: 162, b: 247 },
            system: Color::Rgb { r: 224, g: 175, b: 104 },
            muted: Color::Rgb { r: 86, g: 95, b: 137 },
            error: Color::Rgb { r: 247, g: 118, b: 142 },
        }
    }

    pub fn dracula() -> Self {
        Self {
            name: "dracula",
            narration: Color::Rgb { r: 248, g: 248, b: 242 },
            prompt: Color::Rgb { r: 139, g: 233, b: 253 },
            system: Color::Rgb { r: 241, g: 250, b: 140 },
            muted: Color::Rgb { r: 98, g: 114, b: 164 },
            error: Color::Rgb { r: 255, g: 85, b: 85 },
        }
    }

    pub fn by_name(name: &str) -> Self {
        match name {
            "tokyo-night" => Self::tokyo_night(),
            "dracula" => Self::dracula(),
            _ => Self::dark(),
        }
    }

    pub fn all_names() -> &'static [&'static str] {
        &["dark", "tokyo-night", "dracula"]
    }
}

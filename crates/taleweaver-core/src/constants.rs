//! Taleweaver centralized constants.
//! All model parameters, prompts, and paths live here.
//! Never hardcode these values elsewhere.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    pub const DEFAULT_NARRATOR_MODEL: &str = "gpt-4o";
    pub const DEFAULT_COMPACTOR_MODEL: &str = "gpt-4o-mini";
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
    pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Longest silence tolerated while waiting for response headers or the
    /// next body chunk. Long narrations are fine as long as data keeps coming.
    pub const IDLE_TIMEOUT_SECS: u64 = 90;
}

// ─── Narrator ─────────────────────────────────────────────────────────────────

pub mod narrator {
    pub const TEMPERATURE: f32 = 0.9;
    pub const MAX_TOKENS: u32 = 1500;

    pub const SYSTEM_PROMPT: &str = "\
You are the narrator of an interactive text adventure game. \
Describe the world vividly in the second person, react to every command the \
player types, and keep track of their location, inventory and the state of \
the world across turns. Never act or decide on the player's behalf. End each \
reply by making clear what the player can see or do next.";

    /// Seed instruction for a new game; `{theme}` is replaced with the
    /// player's chosen theme.
    pub const SEED_PROMPT: &str = "Generate a text adventure world using theme {theme}";
}

// ─── Compactor ────────────────────────────────────────────────────────────────

pub mod compactor {
    pub const TEMPERATURE: f32 = 0.2;
    pub const MAX_TOKENS: u32 = 800;

    /// `{text}` is replaced with the narration to compact.
    pub const INSTRUCTION: &str = "\
Rewrite the following text adventure narration so that it uses as few tokens \
as possible. Keep every fact that matters for continuing the story: places, \
exits, characters, items, the player's state and any unresolved events. Drop \
style and repetition. Reply with the rewritten text only.

{text}";
}

// ─── Retry ────────────────────────────────────────────────────────────────────

pub mod retry {
    pub const MAX_ATTEMPTS: u32 = 5;
    pub const DELAY_SECS: u64 = 5;
}

// ─── Config Paths ─────────────────────────────────────────────────────────────

pub mod paths {
    pub const CONFIG_DIR: &str = "taleweaver";
    pub const CONFIG_FILE: &str = "config.toml";
    pub const SAVE_FILE: &str = "savegame.json";
}

// ─── Input ────────────────────────────────────────────────────────────────────

pub mod input {
    /// Reserved words intercepted before a command reaches the narrator.
    pub const SAVE: &str = "save";
    pub const LOAD: &str = "load";
}

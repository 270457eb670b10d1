//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");

// Stage indicators
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[PROG]");

// External capability clients and supporting services

pub mod fonts;
pub mod ocr;
pub mod translation;

pub use fonts::{FontResolver, ResolvedFont};
pub use ocr::{HttpOcrEngine, OcrCandidate, OcrEngine};
pub use translation::{HttpTranslationEngine, Translation, TranslationEngine};

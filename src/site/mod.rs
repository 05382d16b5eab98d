//! The site-facing half of the engine: URL construction and response
//! classification (Fetcher, §4.B), the shared interval/ban gate (Rate
//! Limiter + Ban Barrier, §4.C), the cheap list-vs-detail comparison
//! (Change Detector, §4.D), and the black-boxed HTML signal extraction
//! (Parser).

pub mod change_detector;
pub mod fetcher;
pub mod parser;
pub mod rate_limiter;

use std::path::Path;

use cardgen_core::{Card, CardConfig, ConfigError, RefineKind, Row};
use cardgen_import::{clean_labels, read_sheet, CardExtractor, Extraction, ScanHooks, SheetError};
use cardgen_refine::TextRefiner;
use futures::future;
use futures::stream::{self, StreamExt};

/// Outcome of one run over a sheet.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Scan result before refinement, with source row ranges.
    pub extraction: Extraction,
    /// Final cards, in sheet order.
    pub cards: Vec<Card>,
    /// Cards whose refined address came back empty or blacklisted.
    pub dropped_after_refine: usize,
    /// The scan or the refinement stage stopped early; `cards` is incomplete.
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Read → scan → validate → refine → collect.
pub struct CardPipeline {
    extractor: CardExtractor,
    refiner: TextRefiner,
    concurrency: usize,
}

impl CardPipeline {
    pub fn new(config: &CardConfig, refiner: TextRefiner) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            extractor: CardExtractor::new(config),
            refiner,
            concurrency: 4,
        })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn process_file(
        &self,
        path: &Path,
        config: &CardConfig,
        hooks: &ScanHooks<'_>,
    ) -> Result<PipelineReport, SheetError> {
        let sheet = read_sheet(path, config)?;
        tracing::info!("Read {} rows from {}", sheet.len(), path.display());
        Ok(self.process_rows(sheet.rows(), hooks).await)
    }

    pub async fn process_rows(&self, rows: &[Row], hooks: &ScanHooks<'_>) -> PipelineReport {
        let extraction = self.extractor.extract_with(rows, hooks);

        if !self.refiner.is_enabled() || extraction.cancelled {
            let cards = extraction.cards.iter().map(|c| c.card.clone()).collect();
            let cancelled = extraction.cancelled;
            return PipelineReport { extraction, cards, dropped_after_refine: 0, cancelled };
        }

        tracing::info!(
            "Refining {} cards with {} ({} at a time)",
            extraction.cards.len(),
            self.refiner.model(),
            self.concurrency
        );
        // No new card is dispatched once cancellation is requested; calls
        // already in flight finish.
        let refined: Vec<Option<Card>> = stream::iter(extraction.cards.iter())
            .take_while(|_| future::ready(!hooks.is_cancelled()))
            .map(|c| self.refine_card(&c.card))
            .buffered(self.concurrency)
            .collect()
            .await;

        let total = refined.len();
        let cancelled = total < extraction.cards.len();
        if cancelled {
            tracing::warn!("Refinement cancelled after {total} of {} cards", extraction.cards.len());
        }
        let cards: Vec<Card> = refined.into_iter().flatten().collect();
        let dropped_after_refine = total - cards.len();
        if dropped_after_refine > 0 {
            tracing::info!("{dropped_after_refine} cards dropped after refinement");
        }
        PipelineReport { extraction, cards, dropped_after_refine, cancelled }
    }

    async fn refine_card(&self, card: &Card) -> Option<Card> {
        let (address, message) = futures::join!(
            self.refiner.refine(&card.address, RefineKind::Address),
            self.refiner.refine(&card.message, RefineKind::Message),
        );

        let address = clean_labels(&address);
        if address.is_empty() {
            tracing::warn!("Refiner found no address in {:?}, dropping card", card.address);
            return None;
        }
        if let Some(entry) = self.extractor.validator().blacklist_hit(&address) {
            tracing::debug!("Refined address matches blacklist entry '{entry}', dropping card");
            return None;
        }
        Some(Card { address, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardgen_refine::{MockBackend, RefineBackend, RefineError, RefineRequest};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const ANCHOR: &str = "RECIPIENT FULL ADDRESS";

    fn r(address: &str, message: &str) -> Row {
        Row::new(address, message)
    }

    fn birthday_rows() -> Vec<Row> {
        vec![
            r("Order #1001", ""),
            r("", ""),
            r(ANCHOR, "GIFT MESSAGE"),
            r("123 Main St", ""),
            r("", "Happy Birthday!"),
            r("Tel: 555-1234", ""),
            r("", ""),
            r("", ""),
        ]
    }

    fn pipeline(refiner: TextRefiner) -> CardPipeline {
        CardPipeline::new(&CardConfig::default(), refiner).unwrap()
    }

    fn with_backend(backend: impl RefineBackend + 'static) -> CardPipeline {
        pipeline(TextRefiner::new(Arc::new(backend), "test-model"))
    }

    #[tokio::test]
    async fn unrefined_birthday_card() {
        let report = pipeline(TextRefiner::disabled())
            .process_rows(&birthday_rows(), &ScanHooks::default())
            .await;
        assert_eq!(report.extraction.anchor_row, Some(2));
        assert_eq!(report.cards, vec![Card::new("123 Main St\n555-1234", "Happy Birthday!")]);
        assert_eq!(report.dropped_after_refine, 0);
    }

    #[tokio::test]
    async fn failing_refiner_keeps_cleaned_text() {
        let report = with_backend(MockBackend::failing())
            .process_rows(&birthday_rows(), &ScanHooks::default())
            .await;
        assert_eq!(report.cards, vec![Card::new("123 Main St\n555-1234", "Happy Birthday!")]);
    }

    #[tokio::test]
    async fn conversational_reply_keeps_original() {
        let report = with_backend(MockBackend::new("Sure! Here's the formatted text."))
            .process_rows(&birthday_rows(), &ScanHooks::default())
            .await;
        assert_eq!(report.cards, vec![Card::new("123 Main St\n555-1234", "Happy Birthday!")]);
    }

    #[tokio::test]
    async fn refined_address_is_label_stripped() {
        let report = with_backend(MockBackend::new("123 Main Street\nPhone: 555-1234"))
            .process_rows(&birthday_rows(), &ScanHooks::default())
            .await;
        assert_eq!(report.cards.len(), 1);
        assert_eq!(report.cards[0].address, "123 Main Street\n555-1234");
    }

    #[tokio::test]
    async fn empty_address_reply_drops_card() {
        let report = with_backend(MockBackend::new(""))
            .process_rows(&birthday_rows(), &ScanHooks::default())
            .await;
        assert!(report.is_empty());
        assert_eq!(report.dropped_after_refine, 1);
        assert_eq!(report.extraction.cards.len(), 1);
    }

    #[tokio::test]
    async fn blacklist_rechecked_after_refinement() {
        let report = with_backend(MockBackend::new("750 Millway Ave\n555-0000"))
            .process_rows(&birthday_rows(), &ScanHooks::default())
            .await;
        assert!(report.cards.is_empty());
        assert_eq!(report.dropped_after_refine, 1);
    }

    /// Replies slower for earlier inputs so completions arrive out of order.
    struct Staggered;

    #[async_trait::async_trait]
    impl RefineBackend for Staggered {
        async fn complete(&self, request: &RefineRequest) -> Result<String, RefineError> {
            let n: u64 = request
                .raw_text
                .split_whitespace()
                .next()
                .and_then(|w| w.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(50u64.saturating_sub(n * 10))).await;
            Ok(request.raw_text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn concurrent_refinement_keeps_sheet_order() {
        let mut rows = vec![r(ANCHOR, "")];
        for i in 1..=4 {
            rows.push(r(&format!("{i} Elm Street 555"), "Cheers"));
            rows.extend((0..4).map(|_| r("", "")));
        }
        let report = with_backend(Staggered)
            .with_concurrency(4)
            .process_rows(&rows, &ScanHooks::default())
            .await;
        let addresses: Vec<&str> = report.cards.iter().map(|c| c.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["1 ELM STREET 555", "2 ELM STREET 555", "3 ELM STREET 555", "4 ELM STREET 555"]
        );
        assert!(report.cards.iter().all(|c| c.message == "CHEERS"));
    }

    #[tokio::test]
    async fn cancelled_scan_is_reported() {
        let cancel = AtomicBool::new(true);
        let hooks = ScanHooks { progress: None, cancel: Some(&cancel) };
        let report = pipeline(TextRefiner::disabled())
            .process_rows(&birthday_rows(), &hooks)
            .await;
        assert!(report.extraction.cancelled);
        assert!(report.cancelled);
        assert!(report.cards.is_empty());
    }

    /// Raises the cancel flag on its first call, as Ctrl-C during refinement would.
    struct CancelOnFirstCall {
        cancel: Arc<AtomicBool>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RefineBackend for CancelOnFirstCall {
        async fn complete(&self, request: &RefineRequest) -> Result<String, RefineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cancel.store(true, Ordering::SeqCst);
            Ok(request.raw_text.clone())
        }
    }

    #[tokio::test]
    async fn cancel_during_refinement_stops_dispatch() {
        let mut rows = vec![r(ANCHOR, "")];
        for i in 1..=6 {
            rows.push(r(&format!("{i} Elm Street 555"), "Cheers"));
            rows.extend((0..4).map(|_| r("", "")));
        }
        let cancel = Arc::new(AtomicBool::new(false));
        let backend = Arc::new(CancelOnFirstCall { cancel: cancel.clone(), calls: AtomicUsize::new(0) });
        let pipeline = CardPipeline::new(&CardConfig::default(), TextRefiner::new(backend.clone(), "m"))
            .unwrap()
            .with_concurrency(1);
        let hooks = ScanHooks { progress: None, cancel: Some(cancel.as_ref()) };

        let report = pipeline.process_rows(&rows, &hooks).await;
        assert!(!report.extraction.cancelled);
        assert_eq!(report.extraction.cards.len(), 6);
        assert!(report.cancelled);
        assert!(report.cards.len() < 6);
        // One card's address and message, nothing further.
        assert!(backend.calls.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn uncancelled_run_is_not_flagged() {
        let report = with_backend(MockBackend::echo(""))
            .process_rows(&birthday_rows(), &ScanHooks::default())
            .await;
        assert!(!report.cancelled);
        assert_eq!(report.cards.len(), 1);
    }

    #[tokio::test]
    async fn reads_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        let csv = "\
,,,Order #1001,,,,,
,,,RECIPIENT FULL ADDRESS,,,,,GIFT MESSAGE
,,,123 Main St,,,,,
,,,,,,,,Happy Birthday!
,,,Tel: 555-1234,,,,,
,,,,,,,,
,,,,,,,,
";
        std::fs::write(&path, csv).unwrap();
        let config = CardConfig::default();
        let report = pipeline(TextRefiner::disabled())
            .process_file(&path, &config, &ScanHooks::default())
            .await
            .unwrap();
        assert_eq!(report.cards, vec![Card::new("123 Main St\n555-1234", "Happy Birthday!")]);
    }

    #[tokio::test]
    async fn unsupported_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let result = pipeline(TextRefiner::disabled())
            .process_file(&path, &CardConfig::default(), &ScanHooks::default())
            .await;
        assert!(matches!(result, Err(SheetError::UnsupportedFormat(_))));
    }
}

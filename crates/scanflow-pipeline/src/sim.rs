//! Single-threaded tick loop driving a chain from a source to a sink.
//!
//! Each tick: the sink samples the chain output under the consumer's
//! readiness, the chain advances with the producer's current token, then
//! the producer advances if its token was accepted. After the source is
//! drained the loop keeps ticking until every in-flight token has reached
//! the sink.

use crate::chain::Chain;
use crate::diagnostics::RunReport;
use crate::handshake::{Backpressure, Producer, Sink};
use crate::kernel::Stage;
use crate::token::Token;
use crate::types::StreamError;

/// Tokens collected at the sink plus run counters.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Every valid token the sink accepted, in order.
    pub tokens: Vec<Token>,
    /// Tick and transfer counts.
    pub report: RunReport,
}

/// Stream `input` through `chain` with the consumer readiness given by
/// `backpressure`.
///
/// # Errors
///
/// Returns [`StreamError::InvalidConfig`] if `backpressure` is never
/// ready, since the run could not make progress.
pub fn run<I>(
    chain: &mut Chain,
    input: I,
    backpressure: &Backpressure,
) -> Result<RunOutput, StreamError>
where
    I: IntoIterator<Item = Token>,
{
    if !backpressure.ever_ready() {
        return Err(StreamError::InvalidConfig(
            "backpressure pattern is never ready".to_string(),
        ));
    }

    let mut producer = Producer::new(input);
    let mut sink = Sink::new();
    let depth = chain.depth();

    let mut ticks: u64 = 0;
    let mut stalled_ticks: u64 = 0;
    let mut drain = 0;

    loop {
        let ready = backpressure.ready(ticks);
        let upstream_ready = chain.ready(ready);

        sink.tick(chain.output(), ready);
        chain.tick(producer.output(), ready);
        producer.tick(upstream_ready);

        ticks += 1;
        if !ready {
            stalled_ticks += 1;
        }
        if producer.is_done() && ready {
            drain += 1;
            if drain > depth {
                break;
            }
        }
    }

    let tokens = sink.into_tokens();
    let report = RunReport {
        ticks,
        stalled_ticks,
        accepted: producer.sent(),
        emitted: tokens.len() as u64,
        depth,
        stages: chain.stage_reports(),
    };
    Ok(RunOutput { tokens, report })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::raster;
    use crate::token::FrameSize;
    use crate::types::{ChainConfig, StageConfig};

    fn chain(stages: Vec<StageConfig>, size: FrameSize) -> Chain {
        let config = ChainConfig {
            max_image_width: 64,
            stages,
            ..ChainConfig::default()
        };
        Chain::from_config(&config, size).unwrap()
    }

    #[test]
    fn point_chain_preserves_token_count() {
        let size = FrameSize::new(5, 4);
        let mut chain = chain(
            vec![StageConfig::Threshold {
                threshold: 9,
                max_value: 255,
                invert: false,
            }],
            size,
        );
        let values: Vec<u32> = (0..20).collect();
        let out = run(
            &mut chain,
            raster::frame_tokens(size, &values),
            &Backpressure::Always,
        )
        .unwrap();
        assert_eq!(out.tokens.len(), 20);
        assert_eq!(out.report.accepted, 20);
        assert_eq!(out.report.emitted, 20);
        assert_eq!(out.report.stalled_ticks, 0);
        let expected: Vec<u32> = (0..20).map(|v| if v > 9 { 255 } else { 0 }).collect();
        let got: Vec<u32> = out.tokens.iter().map(|t| t.value).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn stalls_do_not_lose_or_duplicate_tokens() {
        let size = FrameSize::new(6, 6);
        let values: Vec<u32> = (0..36).map(|v| (v * 7) % 256).collect();
        let reference = {
            let mut chain = chain(vec![StageConfig::Median], size);
            run(
                &mut chain,
                raster::frame_tokens(size, &values),
                &Backpressure::Always,
            )
            .unwrap()
        };
        for backpressure in [
            Backpressure::StallEvery { period: 2 },
            Backpressure::StallEvery { period: 5 },
            Backpressure::Pattern {
                ready: vec![true, false, false, true, true, false, true],
            },
        ] {
            let mut chain = chain(vec![StageConfig::Median], size);
            let out = run(&mut chain, raster::frame_tokens(size, &values), &backpressure).unwrap();
            assert_eq!(out.tokens, reference.tokens, "{backpressure:?}");
            assert!(out.report.stalled_ticks > 0);
            assert_eq!(out.report.accepted, 36);
        }
        assert_eq!(reference.tokens.len(), 16);
    }

    #[test]
    fn never_ready_is_rejected() {
        let size = FrameSize::new(3, 3);
        let mut chain = chain(vec![StageConfig::Blur3], size);
        let result = run(
            &mut chain,
            raster::frame_tokens(size, &[0; 9]),
            &Backpressure::Pattern {
                ready: vec![false],
            },
        );
        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
    }

    #[test]
    fn empty_input_only_drains() {
        let mut chain = chain(vec![StageConfig::Blur3], FrameSize::new(4, 4));
        let out = run(&mut chain, Vec::new(), &Backpressure::Always).unwrap();
        assert!(out.tokens.is_empty());
        assert_eq!(out.report.accepted, 0);
        assert_eq!(out.report.ticks, 3);
    }
}

//! Batched sampling penalties over a logits matrix.
//!
//! Follows the OpenAI API definitions: presence and frequency penalties are
//! additive and computed from the *output* tokens only, the repetition
//! penalty is a multiplicative rescale toward zero for any token seen in
//! prompt or output. All three are applied in place, one coefficient per
//! sequence.

use anyhow::{bail, ensure, Result};
use ndarray::{s, Array2, ArrayView1, ArrayView2, Zip};

/// Per-sequence histogram of token ids.
///
/// `tokens` is `[num_seqs, len]`, right-padded with `vocab_size` — one past
/// the last valid id, so padding accumulates into a synthetic bin that is
/// dropped before returning. Returns a `[num_seqs, vocab_size]` count
/// matrix. Ids beyond the padding sentinel are a caller error.
pub fn token_bin_counts(tokens: ArrayView2<u32>, vocab_size: usize) -> Result<Array2<u32>> {
    let num_seqs = tokens.nrows();
    let mut bin_counts = Array2::<u32>::zeros((num_seqs, vocab_size + 1));
    for (row, mut bins) in tokens.outer_iter().zip(bin_counts.outer_iter_mut()) {
        for &tok in row {
            let idx = tok as usize;
            if idx > vocab_size {
                bail!("token id {tok} out of range for vocab size {vocab_size}");
            }
            bins[idx] += 1;
        }
    }
    Ok(bin_counts.slice(s![.., ..vocab_size]).to_owned())
}

/// Applies repetition, frequency, and presence penalties to `logits` in
/// place.
///
/// `logits` is `[num_seqs, vocab_size]`; `prompt_tokens` and
/// `output_tokens` are `[num_seqs, len]` right-padded with `vocab_size`;
/// the coefficient vectors carry one scalar per sequence. A coefficient of
/// 0 disables the additive penalties and 1 disables repetition.
///
/// The repetition penalty runs first: it rescales the raw score (divide
/// when non-negative, multiply when negative), so applying it after the
/// additive terms would change the result. Shape mismatches and
/// out-of-range token ids fail before any logit is touched.
pub fn apply_penalties(
    logits: &mut Array2<f32>,
    prompt_tokens: ArrayView2<u32>,
    output_tokens: ArrayView2<u32>,
    presence: ArrayView1<f32>,
    frequency: ArrayView1<f32>,
    repetition: ArrayView1<f32>,
) -> Result<()> {
    let (num_seqs, vocab_size) = logits.dim();
    ensure!(
        prompt_tokens.nrows() == num_seqs,
        "prompt tokens have {} rows, logits have {}",
        prompt_tokens.nrows(),
        num_seqs
    );
    ensure!(
        output_tokens.nrows() == num_seqs,
        "output tokens have {} rows, logits have {}",
        output_tokens.nrows(),
        num_seqs
    );
    ensure!(
        presence.len() == num_seqs,
        "presence penalties have length {}, expected {}",
        presence.len(),
        num_seqs
    );
    ensure!(
        frequency.len() == num_seqs,
        "frequency penalties have length {}, expected {}",
        frequency.len(),
        num_seqs
    );
    ensure!(
        repetition.len() == num_seqs,
        "repetition penalties have length {}, expected {}",
        repetition.len(),
        num_seqs
    );

    let prompt_bins = token_bin_counts(prompt_tokens, vocab_size)?;
    let output_bins = token_bin_counts(output_tokens, vocab_size)?;

    // Rows are independent, so apply per-sequence in parallel. The
    // occurrence masks are just `count > 0`, derived on the fly.
    Zip::from(logits.rows_mut())
        .and(prompt_bins.rows())
        .and(output_bins.rows())
        .and(&presence)
        .and(&frequency)
        .and(&repetition)
        .par_for_each(|mut row, p_bins, o_bins, &pres, &freq, &rep| {
            for (v, score) in row.iter_mut().enumerate() {
                let count = o_bins[v];
                if p_bins[v] > 0 || count > 0 {
                    if *score < 0.0 {
                        *score *= rep;
                    } else {
                        *score /= rep;
                    }
                }
                *score -= freq * count as f32;
                if count > 0 {
                    *score -= pres;
                }
            }
        });

    Ok(())
}

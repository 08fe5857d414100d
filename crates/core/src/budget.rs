//! Budget-aware context assembly — given a token budget and a set of
//! paths, select and progressively demote file content (full source ->
//! folded-body skeleton -> table of contents -> manifest line) until the
//! total fits. A thin query layer over the Skeleton Generator and the
//! UCG's LOD concept, not a separate subsystem.

use crate::skeleton::{self, SkeletonTier};
use crate::tokenizer::Tokenizer;
use std::sync::Arc;

pub struct BudgetedFile {
    pub path: String,
    pub content: String,
    pub tier: SkeletonTier,
    pub tokens: usize,
}

pub struct BudgetResult {
    pub files: Vec<BudgetedFile>,
    pub total_tokens: usize,
    pub budget: usize,
    /// Paths dropped entirely because even the coarsest tier didn't fit —
    /// never silently absorbed into `files`, always reported.
    pub omitted: Vec<String>,
}

/// One candidate file's full source plus its already-extracted symbols
/// (needed by the Skeleton Generator to find fold points).
pub struct BudgetCandidate<'a> {
    pub path: &'a str,
    pub source: &'a str,
    pub definitions: &'a [crate::model::Symbol],
}

const TIERS: [SkeletonTier; 4] =
    [SkeletonTier::Full, SkeletonTier::FoldedBodies, SkeletonTier::TableOfContents, SkeletonTier::ManifestLine];

/// Assemble as much of `candidates` as fits within `budget_tokens`, trying
/// each file at `Full` first and demoting tier-by-tier only the files
/// needed to fit, preferring to keep earlier (presumably more relevant)
/// candidates at a finer tier than later ones.
pub fn assemble(candidates: &[BudgetCandidate<'_>], budget_tokens: usize, tokenizer: &Arc<dyn Tokenizer>) -> BudgetResult {
    let mut best_tier = vec![0usize; candidates.len()];
    let mut rendered: Vec<String> = candidates
        .iter()
        .map(|c| skeleton::generate(c.path, c.source, c.definitions, SkeletonTier::Full))
        .collect();
    let mut tokens: Vec<usize> = rendered.iter().map(|r| tokenizer.count_tokens(r)).collect();

    let mut omitted = Vec::new();

    while tokens.iter().sum::<usize>() > budget_tokens {
        // Demote the single largest still-demotable file by one tier.
        let Some(worst) = (0..candidates.len())
            .filter(|&i| best_tier[i] < TIERS.len() - 1)
            .max_by_key(|&i| tokens[i])
        else {
            break;
        };
        best_tier[worst] += 1;
        let tier = TIERS[best_tier[worst]];
        rendered[worst] = skeleton::generate(candidates[worst].path, candidates[worst].source, candidates[worst].definitions, tier);
        tokens[worst] = tokenizer.count_tokens(&rendered[worst]);
    }

    if tokens.iter().sum::<usize>() > budget_tokens {
        // Even the coarsest tier for every file doesn't fit: drop files
        // from the tail (assumed lowest priority) until it does.
        let mut running: usize = tokens.iter().sum();
        let mut i = candidates.len();
        while running > budget_tokens && i > 0 {
            i -= 1;
            running -= tokens[i];
            omitted.push(candidates[i].path.to_string());
        }
        let kept = i;
        let files = (0..kept)
            .map(|idx| BudgetedFile {
                path: candidates[idx].path.to_string(),
                content: rendered[idx].clone(),
                tier: TIERS[best_tier[idx]],
                tokens: tokens[idx],
            })
            .collect();
        let total_tokens = tokens[..kept].iter().sum();
        omitted.reverse();
        return BudgetResult { files, total_tokens, budget: budget_tokens, omitted };
    }

    let total_tokens = tokens.iter().sum();
    let files = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| BudgetedFile { path: c.path.to_string(), content: rendered[i].clone(), tier: TIERS[best_tier[i]], tokens: tokens[i] })
        .collect();
    BudgetResult { files, total_tokens, budget: budget_tokens, omitted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::BytesEstimateTokenizer;

    #[test]
    fn fits_within_budget_by_demoting_largest_file() {
        let big_source = "fn big_function() {\n".to_string() + &"    let x = 1;\n".repeat(200) + "}\n";
        let small_source = "fn small() {}".to_string();
        let candidates = vec![
            BudgetCandidate { path: "big.rs", source: &big_source, definitions: &[] },
            BudgetCandidate { path: "small.rs", source: &small_source, definitions: &[] },
        ];
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(BytesEstimateTokenizer);
        let result = assemble(&candidates, 50, &tokenizer);
        assert!(result.total_tokens <= 50 || !result.omitted.is_empty());
    }

    #[test]
    fn everything_fits_when_budget_is_generous() {
        let source = "fn a() {}".to_string();
        let candidates = vec![BudgetCandidate { path: "a.rs", source: &source, definitions: &[] }];
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(BytesEstimateTokenizer);
        let result = assemble(&candidates, 10_000, &tokenizer);
        assert_eq!(result.files.len(), 1);
        assert!(result.omitted.is_empty());
        assert!(matches!(result.files[0].tier, SkeletonTier::Full));
    }
}

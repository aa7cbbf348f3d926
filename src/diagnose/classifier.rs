//! Output-log failure classification
//!
//! Purely analytical: reads the captured output file, matches it
//! against an ordered rule table, and returns a `Diagnostic`. The
//! evaluation order is fixed and first-match-wins so mixed-signal logs
//! (a diverging SCF that then segfaults) report one coherent cause
//! instead of a compound message.
//!
//! Matching is exact-case substring matching. The patterns are the
//! literal strings the compute binary prints, so case-folding would
//! only invite false positives from user-supplied text echoed into
//! the log.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Number of trailing log lines attached to a diagnostic excerpt
pub const EXCERPT_LINES: usize = 20;

/// Failure category of a non-zero compute exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Self-consistent field iteration failed to converge
    ScfDivergence,
    /// Out-of-memory condition or memory fault
    MemoryError,
    /// Bad input configuration or basis-set definition
    ConfigError,
    /// No rule matched; raw excerpt attached for manual inspection
    Unknown,
    /// The output log itself was missing or unreadable
    NoOutput,
}

impl FailureCategory {
    /// Short name for logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            FailureCategory::ScfDivergence => "scf_divergence",
            FailureCategory::MemoryError => "memory_error",
            FailureCategory::ConfigError => "config_error",
            FailureCategory::Unknown => "unknown",
            FailureCategory::NoOutput => "no_output",
        }
    }
}

/// Structured classification of a failed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Failure category
    pub category: FailureCategory,
    /// One-paragraph human explanation
    pub explanation: String,
    /// Ordered remediation steps
    pub remediation: Vec<String>,
    /// Trailing lines of the output log, verbatim
    pub log_excerpt: String,
}

impl Diagnostic {
    /// Print the diagnostic in the standard numbered-steps layout
    pub fn print_summary(&self) {
        println!("\n=== Failure Diagnosis ===");
        println!("Category:    {}", self.category.name());
        println!("Explanation: {}", self.explanation);
        if !self.remediation.is_empty() {
            println!("\nSuggested remediation:");
            for (i, step) in self.remediation.iter().enumerate() {
                println!("  {}. {}", i + 1, step);
            }
        }
        if !self.log_excerpt.is_empty() {
            println!("\nLog excerpt (last {} lines):", EXCERPT_LINES);
            for line in self.log_excerpt.lines() {
                println!("  | {}", line);
            }
        }
    }
}

/// One classification rule: patterns plus the diagnostic it produces
struct Rule {
    category: FailureCategory,
    patterns: &'static [&'static str],
    explanation: &'static str,
    remediation: &'static [&'static str],
}

/// Ordered rule table; earlier rules win
const RULES: &[Rule] = &[
    Rule {
        category: FailureCategory::ScfDivergence,
        patterns: &[
            "SCF NOT CONVERGED",
            "SCF did not converge",
            "No convergence in SCF",
        ],
        explanation: "The self-consistent field iteration diverged before reaching \
                      the convergence threshold.",
        remediation: &[
            "Check the input geometry for overlapping or unphysical atom positions",
            "Provide a better initial guess (stage a RESTART file from a converged run)",
            "Reduce the SCF mixing parameter and raise the iteration limit",
        ],
    },
    Rule {
        category: FailureCategory::MemoryError,
        patterns: &[
            "memory allocation failure",
            "Out of memory",
            "Segmentation fault",
            "SIGSEGV",
        ],
        explanation: "The run exhausted available memory or hit a memory fault.",
        remediation: &[
            "Increase the MPI rank count so the problem is distributed over more processes",
            "Run on a node with more memory, or shrink the basis/system size",
        ],
    },
    Rule {
        category: FailureCategory::ConfigError,
        patterns: &[
            "Bad basis specification",
            "basis set not found",
            "Unknown keyword",
        ],
        explanation: "The input deck or basis-set definition was rejected by the \
                      compute binary.",
        remediation: &[
            "Check the basis definition block for syntax errors",
            "Verify element symbols and basis identifiers against the installed basis library",
            "Fall back to a standard default basis to isolate the offending definition",
        ],
    },
];

/// Classify a failed run from its output log
///
/// Never fails: a missing or unreadable log degrades to a `no_output`
/// diagnostic, and an unmatched log degrades to `unknown` with the
/// trailing lines attached verbatim.
pub fn classify(output_path: &Path) -> Diagnostic {
    let contents = match fs::read_to_string(output_path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!(path = %output_path.display(), error = %e, "output log unreadable");
            return Diagnostic {
                category: FailureCategory::NoOutput,
                explanation: format!(
                    "The job produced no readable output log at '{}'; it likely \
                     failed before the compute binary started writing.",
                    output_path.display()
                ),
                remediation: vec![
                    "Check that the executable launched at all (see the harness log)".to_string(),
                    "Re-run with RUST_LOG=debug for the full launch trace".to_string(),
                ],
                log_excerpt: String::new(),
            };
        }
    };

    for rule in RULES {
        if rule.patterns.iter().any(|p| contents.contains(p)) {
            debug!(category = rule.category.name(), "failure signature matched");
            return Diagnostic {
                category: rule.category,
                explanation: rule.explanation.to_string(),
                remediation: rule.remediation.iter().map(|s| s.to_string()).collect(),
                log_excerpt: tail(&contents, EXCERPT_LINES),
            };
        }
    }

    Diagnostic {
        category: FailureCategory::Unknown,
        explanation: "The run failed but no known failure signature was found in the \
                      output log."
            .to_string(),
        remediation: vec![
            "Inspect the attached log excerpt manually".to_string(),
            "Check the scheduler/system logs for external causes (node failure, OOM killer)"
                .to_string(),
        ],
        log_excerpt: tail(&contents, EXCERPT_LINES),
    }
}

/// Last `n` lines of `contents`, verbatim
fn tail(contents: &str, n: usize) -> String {
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_is_no_output() {
        let diagnostic = classify(Path::new("/nonexistent/OUTPUT"));
        assert_eq!(diagnostic.category, FailureCategory::NoOutput);
        assert!(diagnostic.log_excerpt.is_empty());
    }

    #[test]
    fn test_scf_divergence_detected() {
        let log = write_log("iter 48  dE = 3.2e+1\niter 49  dE = 8.1e+2\nSCF NOT CONVERGED\n");
        let diagnostic = classify(log.path());
        assert_eq!(diagnostic.category, FailureCategory::ScfDivergence);
        assert!(!diagnostic.remediation.is_empty());
        assert!(diagnostic.log_excerpt.contains("SCF NOT CONVERGED"));
    }

    #[test]
    fn test_first_match_wins_on_mixed_log() {
        // Divergence outranks the later segfault
        let log = write_log("SCF NOT CONVERGED\n...\nSegmentation fault\n");
        let diagnostic = classify(log.path());
        assert_eq!(diagnostic.category, FailureCategory::ScfDivergence);
    }

    #[test]
    fn test_memory_error_detected() {
        let log = write_log("allocating work arrays\nOut of memory\n");
        let diagnostic = classify(log.path());
        assert_eq!(diagnostic.category, FailureCategory::MemoryError);
        assert!(diagnostic.remediation[0].contains("rank"));
    }

    #[test]
    fn test_config_error_detected() {
        let log = write_log("reading basis blocks\nBad basis specification for atom Fe\n");
        let diagnostic = classify(log.path());
        assert_eq!(diagnostic.category, FailureCategory::ConfigError);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        // Lower-cased marker must NOT match; policy is exact-case
        let log = write_log("scf not converged\n");
        let diagnostic = classify(log.path());
        assert_eq!(diagnostic.category, FailureCategory::Unknown);
    }

    #[test]
    fn test_unknown_attaches_tail_excerpt() {
        let body: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let log = write_log(&body);
        let diagnostic = classify(log.path());
        assert_eq!(diagnostic.category, FailureCategory::Unknown);
        assert_eq!(diagnostic.log_excerpt.lines().count(), EXCERPT_LINES);
        assert!(diagnostic.log_excerpt.starts_with("line 30"));
        assert!(diagnostic.log_excerpt.ends_with("line 49"));
    }

    #[test]
    fn test_tail_shorter_than_window() {
        assert_eq!(tail("a\nb", 20), "a\nb");
        assert_eq!(tail("", 20), "");
    }
}

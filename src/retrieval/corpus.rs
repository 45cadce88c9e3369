//! Seed corpus of synthetic PRA / COREP Own Funds excerpts
//!
//! Loaded into the in-process index when no external retrieval service is configured.

pub struct SeedDocument {
    pub source: &'static str,
    pub citation: &'static str,
    pub text: &'static str,
}

const PRA_RULEBOOK: &str = "PRA Rulebook (synthetic excerpt)";
const COREP_ITS: &str = "COREP Implementing Technical Standards (synthetic excerpt)";

pub const SEED_DOCUMENTS: &[SeedDocument] = &[
    SeedDocument {
        source: PRA_RULEBOOK,
        citation: "CRR Art. 92(1)(a) – minimum CET1 capital ratio (illustrative)",
        text: "Under the PRA's implementation of the CRR, institutions must maintain \
a minimum Common Equity Tier 1 (CET1) capital ratio of at least 4.5% \
of their total risk-weighted exposure amount (RWA). CET1 capital is \
composed primarily of common shares, share premium, retained earnings, \
accumulated other comprehensive income and certain regulatory adjustments.",
    },
    SeedDocument {
        source: PRA_RULEBOOK,
        citation: "CRR Part Two – Own Funds (illustrative)",
        text: "Additional Tier 1 (AT1) instruments are perpetual subordinated \
instruments that meet the relevant eligibility criteria. Tier 2 \
capital consists of subordinated instruments with limited \
maturity and certain loan loss provisions. Total capital is the \
sum of Tier 1 capital (CET1 + AT1) and Tier 2 capital.",
    },
    SeedDocument {
        source: PRA_RULEBOOK,
        citation: "CRR Part Three – Capital Requirements (illustrative)",
        text: "Risk-weighted assets (RWA) represent the total of exposure values \
multiplied by applicable risk weights under the standardised or \
internal ratings based approaches. Capital ratios are expressed as \
capital amounts divided by total RWA. Institutions must monitor \
their CET1, Tier 1 and total capital ratios against minimum and \
buffer requirements at all times.",
    },
    SeedDocument {
        source: COREP_ITS,
        citation: "ITS on Supervisory Reporting – COREP Own Funds (illustrative)",
        text: "The COREP Own Funds templates require firms to report CET1, AT1, \
Tier 2 capital and total risk exposure amount in the relevant \
reporting currency. Ratios should typically be reported to at \
least four decimal places when expressed as decimals.",
    },
];

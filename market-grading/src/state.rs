//! Grading state machine.

use common::types::{ChainFamily, PendingResolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeState {
    FetchPending,
    GenerateQueries,
    GatherEvidence,
    Grade,
    ChooseChain,
    ResolveEvm,
    ResolveOther,
    End,
}

/// The submitter runs if and only if the record is healthy, not yet
/// written, and carries a writable verdict (codes 1..=3).
pub fn can_resolve(rec: &PendingResolution) -> bool {
    !rec.failed
        && !rec.contract_updated
        && rec
            .verdict
            .as_ref()
            .map(|v| v.code.is_writable())
            .unwrap_or(false)
}

/// `state × record fields → next state`.
pub fn next_state(state: GradeState, rec: &PendingResolution) -> GradeState {
    use GradeState::*;
    match state {
        FetchPending => GenerateQueries,
        GenerateQueries => {
            if rec.failed {
                End
            } else {
                GatherEvidence
            }
        }
        GatherEvidence => {
            if rec.failed {
                End
            } else {
                Grade
            }
        }
        Grade => {
            if rec.failed {
                End
            } else {
                ChooseChain
            }
        }
        ChooseChain => {
            if !can_resolve(rec) {
                return End;
            }
            match rec.chain_family {
                Some(ChainFamily::Evm) => ResolveEvm,
                Some(ChainFamily::Other) => ResolveOther,
                None => End,
            }
        }
        ResolveEvm | ResolveOther | End => End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::types::{MarketSnapshot, ResultCode, Verdict};

    fn record() -> PendingResolution {
        PendingResolution::new(MarketSnapshot {
            market_id: "5".into(),
            question: "Will it pass?".into(),
            options: vec!["Yes".into(), "No".into()],
            close_time: Utc::now(),
            closure_criteria: String::new(),
            chain: "bsc".into(),
        })
    }

    fn verdict(code: ResultCode) -> Verdict {
        Verdict {
            code,
            label: "x".into(),
            probabilities: vec![],
            sources: vec![],
            explanation: String::new(),
        }
    }

    #[test]
    fn test_failed_record_skips_remaining_stages() {
        let mut rec = record();
        rec.fail("failed_query_generation");
        assert_eq!(next_state(GradeState::GenerateQueries, &rec), GradeState::End);
        assert_eq!(next_state(GradeState::GatherEvidence, &rec), GradeState::End);
        assert_eq!(next_state(GradeState::Grade, &rec), GradeState::End);
        assert_eq!(next_state(GradeState::ChooseChain, &rec), GradeState::End);
    }

    #[test]
    fn test_writable_codes_route_to_resolution() {
        for code in [ResultCode::OptionA, ResultCode::OptionB, ResultCode::Push] {
            let mut rec = record();
            rec.verdict = Some(verdict(code));
            rec.chain_family = Some(ChainFamily::Evm);
            assert_eq!(next_state(GradeState::ChooseChain, &rec), GradeState::ResolveEvm);

            rec.chain_family = Some(ChainFamily::Other);
            assert_eq!(next_state(GradeState::ChooseChain, &rec), GradeState::ResolveOther);
        }
    }

    #[test]
    fn test_not_ready_and_error_never_resolve() {
        for code in [ResultCode::NotReady, ResultCode::Error] {
            let mut rec = record();
            rec.verdict = Some(verdict(code));
            rec.chain_family = Some(ChainFamily::Evm);
            assert_eq!(next_state(GradeState::ChooseChain, &rec), GradeState::End);
        }
    }

    #[test]
    fn test_contract_updated_blocks_resolution() {
        let mut rec = record();
        rec.verdict = Some(verdict(ResultCode::OptionA));
        rec.chain_family = Some(ChainFamily::Evm);
        rec.contract_updated = true;
        rec.tx_hash = Some("0xdone".into());
        assert_eq!(next_state(GradeState::ChooseChain, &rec), GradeState::End);
    }

    #[test]
    fn test_missing_verdict_blocks_resolution() {
        let mut rec = record();
        rec.chain_family = Some(ChainFamily::Evm);
        assert_eq!(next_state(GradeState::ChooseChain, &rec), GradeState::End);
    }

    #[test]
    fn test_resolution_states_are_terminal() {
        let rec = record();
        assert_eq!(next_state(GradeState::ResolveEvm, &rec), GradeState::End);
        assert_eq!(next_state(GradeState::ResolveOther, &rec), GradeState::End);
        assert_eq!(next_state(GradeState::End, &rec), GradeState::End);
    }
}

//! Standings and final placements, recomputed from finalized sessions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use super::leaderboard;
use super::models::{LeaderboardTier, SessionResult, StandingRow};
use crate::bracket::{ParticipantSource, Session, SessionPhase};
use crate::enrollment::Enrollment;
use crate::ledger::LicenseId;
use crate::tournament::{Tournament, TournamentFormat};

pub const WIN_POINTS: u32 = 3;
pub const DRAW_POINTS: u32 = 1;

/// Seed position by license, 0 is the best seed
pub type Seeds = BTreeMap<LicenseId, usize>;

/// Seeds follow enrollment order of the active roster
pub fn seeds_from_enrollments(enrollments: &[Enrollment]) -> Seeds {
    enrollments
        .iter()
        .filter(|e| e.is_active())
        .enumerate()
        .map(|(seed, e)| (e.license_id, seed))
        .collect()
}

fn seed_of(seeds: &Seeds, license_id: LicenseId) -> usize {
    seeds.get(&license_id).copied().unwrap_or(usize::MAX)
}

/// Head-to-head record of one participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub license_id: LicenseId,
    pub seed: usize,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub points: u32,
    pub score_for: u64,
    pub score_against: u64,
}

impl Record {
    fn new(license_id: LicenseId, seed: usize) -> Self {
        Self {
            license_id,
            seed,
            ..Self::default()
        }
    }

    pub fn difference(&self) -> i128 {
        i128::from(self.score_for) - i128::from(self.score_against)
    }

    /// Points, then difference, then score for, then seed
    pub fn table_cmp(&self, other: &Self) -> Ordering {
        other
            .points
            .cmp(&self.points)
            .then_with(|| other.difference().cmp(&self.difference()))
            .then_with(|| other.score_for.cmp(&self.score_for))
            .then_with(|| self.seed.cmp(&other.seed))
            .then_with(|| self.license_id.cmp(&other.license_id))
    }
}

/// Tally head-to-head records over `sessions`
///
/// Everyone on a roster gets a record, played or not.
pub fn tally<'a, I>(sessions: I, seeds: &Seeds) -> BTreeMap<LicenseId, Record>
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut records: BTreeMap<LicenseId, Record> = BTreeMap::new();
    for session in sessions {
        for license_id in session.participants.iter().flatten() {
            records
                .entry(*license_id)
                .or_insert_with(|| Record::new(*license_id, seed_of(seeds, *license_id)));
        }

        let Some(SessionResult::HeadToHead { scores, winner }) = &session.result else {
            continue;
        };
        if !session.finalized || scores.len() != 2 {
            continue;
        }
        for (me, them) in [(scores[0], scores[1]), (scores[1], scores[0])] {
            let record = records
                .entry(me.license_id)
                .or_insert_with(|| Record::new(me.license_id, seed_of(seeds, me.license_id)));
            record.played += 1;
            record.score_for += u64::from(me.score);
            record.score_against += u64::from(them.score);
            match winner {
                None => {
                    record.draws += 1;
                    record.points += DRAW_POINTS;
                }
                Some(w) if *w == me.license_id => {
                    record.wins += 1;
                    record.points += WIN_POINTS;
                }
                Some(_) => record.losses += 1,
            }
        }
    }
    records
}

/// Records sorted into table order
pub fn table(records: impl IntoIterator<Item = Record>) -> Vec<Record> {
    let mut rows: Vec<Record> = records.into_iter().collect();
    rows.sort_by(Record::table_cmp);
    rows
}

fn group_sessions<'a>(sessions: &'a [Session], label: &'a str) -> impl Iterator<Item = &'a Session> {
    sessions.iter().filter(move |s| {
        s.phase == SessionPhase::Group && s.group_label.as_deref() == Some(label)
    })
}

/// Table of one group
pub fn group_table(sessions: &[Session], label: &str, seeds: &Seeds) -> Vec<Record> {
    table(tally(group_sessions(sessions, label), seeds).into_values())
}

/// Every session of the group is finalized
pub fn group_complete(sessions: &[Session], label: &str) -> bool {
    let mut any = false;
    for session in group_sessions(sessions, label) {
        if !session.finalized {
            return false;
        }
        any = true;
    }
    any
}

fn is_third_place(session: &Session) -> bool {
    !session.sources.is_empty()
        && session
            .sources
            .iter()
            .all(|s| matches!(s, ParticipantSource::LoserOf { .. }))
}

/// Knockout placement of every entrant
///
/// A participant is placed one below everyone who survived strictly longer:
/// champion 1, finalist 2, semi-final losers 3, quarter-final losers 5.
/// A finalized third-place match splits the semi-final losers into 3 and 4.
pub fn knockout_placements(sessions: &[Session]) -> BTreeMap<LicenseId, u32> {
    let knockout: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.phase == SessionPhase::Knockout)
        .collect();
    let (bronze, main): (Vec<&Session>, Vec<&Session>) =
        knockout.into_iter().partition(|s| is_third_place(s));

    let mut entrants = BTreeSet::new();
    let mut eliminated: BTreeMap<LicenseId, u32> = BTreeMap::new();
    for session in &main {
        entrants.extend(session.participants.iter().flatten().copied());
        entrants.extend(session.sources.iter().filter_map(|s| match s {
            ParticipantSource::Fixed { license_id } => Some(*license_id),
            _ => None,
        }));
        if session.finalized {
            if let Some(loser) = session.result.as_ref().and_then(SessionResult::loser) {
                eliminated.insert(loser, session.round);
            }
        }
    }

    let survival = |license_id: &LicenseId| eliminated.get(license_id).copied().unwrap_or(u32::MAX);
    let mut placements: BTreeMap<LicenseId, u32> = entrants
        .iter()
        .map(|license_id| {
            let mine = survival(license_id);
            let ahead = entrants.iter().filter(|other| survival(*other) > mine).count();
            (*license_id, ahead as u32 + 1)
        })
        .collect();

    for session in bronze.iter().filter(|s| s.finalized) {
        if let Some(result) = &session.result {
            if let (Some(winner), Some(loser)) = (result.winner(), result.loser()) {
                placements.insert(winner, 3);
                placements.insert(loser, 4);
            }
        }
    }
    placements
}

fn standing_row(
    license_id: LicenseId,
    placement: u32,
    record: Option<&Record>,
    group_label: Option<String>,
    measured_value: Option<f64>,
) -> StandingRow {
    let record = record.cloned().unwrap_or_default();
    StandingRow {
        license_id,
        placement,
        group_label,
        played: record.played,
        wins: record.wins,
        draws: record.draws,
        losses: record.losses,
        points: record.points,
        score_for: record.score_for,
        score_against: record.score_against,
        measured_value,
        percentile: 0.0,
        tier: LeaderboardTier::Standard,
    }
}

/// Final ranking of a tournament, best first
///
/// Works on partial results too: unplayed knockout entrants count as still
/// alive and unplayed league sessions simply add nothing.
pub fn final_standings(tournament: &Tournament, sessions: &[Session], seeds: &Seeds) -> Vec<StandingRow> {
    let records = tally(sessions, seeds);
    let mut group_of: BTreeMap<LicenseId, String> = BTreeMap::new();
    for session in sessions.iter().filter(|s| s.phase == SessionPhase::Group) {
        if let Some(label) = &session.group_label {
            for license_id in session.participants.iter().flatten() {
                group_of.entry(*license_id).or_insert_with(|| label.clone());
            }
        }
    }
    let row = |license_id: LicenseId, placement: u32, measured: Option<f64>| {
        standing_row(
            license_id,
            placement,
            records.get(&license_id),
            group_of.get(&license_id).cloned(),
            measured,
        )
    };

    let mut rows: Vec<StandingRow> = if !tournament.scoring.is_head_to_head() {
        heat_rows(sessions, seeds)
            .into_iter()
            .map(|(license_id, placement, value)| row(license_id, placement, value))
            .collect()
    } else {
        match tournament.format {
            TournamentFormat::League => table(records.values().cloned())
                .iter()
                .enumerate()
                .map(|(i, r)| row(r.license_id, i as u32 + 1, None))
                .collect(),
            TournamentFormat::Knockout => {
                let mut placed: Vec<(LicenseId, u32)> =
                    knockout_placements(sessions).into_iter().collect();
                placed.sort_by_key(|(license_id, placement)| (*placement, seed_of(seeds, *license_id)));
                placed
                    .into_iter()
                    .map(|(license_id, placement)| row(license_id, placement, None))
                    .collect()
            }
            TournamentFormat::GroupPlusKnockout => group_knockout_order(sessions, seeds)
                .into_iter()
                .map(|(license_id, placement)| row(license_id, placement, None))
                .collect(),
        }
    };

    leaderboard::apply(&mut rows);
    rows
}

/// Qualifiers by knockout placement, then everyone else by group finish
fn group_knockout_order(sessions: &[Session], seeds: &Seeds) -> Vec<(LicenseId, u32)> {
    let mut qualifiers: Vec<(LicenseId, u32)> = knockout_placements(sessions).into_iter().collect();
    qualifiers.sort_by_key(|(license_id, placement)| (*placement, seed_of(seeds, *license_id)));
    let qualified: BTreeSet<LicenseId> = qualifiers.iter().map(|(l, _)| *l).collect();

    let labels: BTreeSet<&str> = sessions
        .iter()
        .filter(|s| s.phase == SessionPhase::Group)
        .filter_map(|s| s.group_label.as_deref())
        .collect();

    let mut rest: Vec<(usize, Record)> = Vec::new();
    for label in labels {
        for (position, record) in group_table(sessions, label, seeds).into_iter().enumerate() {
            if !qualified.contains(&record.license_id) {
                rest.push((position, record));
            }
        }
    }
    rest.sort_by(|(pa, a), (pb, b)| {
        pa.cmp(pb)
            .then_with(|| b.points.cmp(&a.points))
            .then_with(|| b.difference().cmp(&a.difference()))
            .then_with(|| b.score_for.cmp(&a.score_for))
            .then_with(|| a.seed.cmp(&b.seed))
    });

    let offset = qualifiers.len() as u32;
    qualifiers
        .into_iter()
        .chain(
            rest.into_iter()
                .enumerate()
                .map(|(i, (_, record))| (record.license_id, offset + i as u32 + 1)),
        )
        .collect()
}

/// (license, placement, measured value) from the heat
fn heat_rows(sessions: &[Session], seeds: &Seeds) -> Vec<(LicenseId, u32, Option<f64>)> {
    let Some(heat) = sessions.iter().find(|s| s.phase == SessionPhase::Heat) else {
        return Vec::new();
    };
    let mut rows: Vec<(LicenseId, u32, Option<f64>)> = match (&heat.result, heat.finalized) {
        (Some(SessionResult::Individual { placements }), true) => placements
            .iter()
            .map(|p| (p.license_id, p.placement, Some(p.value)))
            .collect(),
        _ => heat
            .participants
            .iter()
            .flatten()
            .map(|license_id| (*license_id, 1, None))
            .collect(),
    };
    rows.sort_by_key(|(license_id, placement, _)| (*placement, seed_of(seeds, *license_id)));
    rows
}

/// Licenses in finishing order of a group, for qualifier resolution
pub fn group_finishers(sessions: &[Session], label: &str, seeds: &Seeds) -> Vec<LicenseId> {
    group_table(sessions, label, seeds)
        .into_iter()
        .map(|r| r.license_id)
        .collect()
}

//! Aggregation of downloaded items into presentation sections
//!
//! Pure functions over already-fetched items. Virtual shows are synthesized
//! on every pass and never stored.

use core_library::models::{CachedItem, ItemKind};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// Presentation group of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKind {
    Movies,
    Shows,
    Episodes,
}

impl SectionKind {
    pub fn label(&self) -> &'static str {
        match self {
            SectionKind::Movies => "Movies",
            SectionKind::Shows => "Shows",
            SectionKind::Episodes => "Episodes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSection {
    pub kind: SectionKind,
    pub label: String,
    pub items: Vec<CachedItem>,
}

impl CollectionSection {
    fn new(kind: SectionKind, items: Vec<CachedItem>) -> Self {
        Self {
            kind,
            label: kind.label().to_string(),
            items,
        }
    }
}

/// Items split by kind, each list keeping input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitioned {
    pub movies: Vec<CachedItem>,
    pub shows: Vec<CachedItem>,
    pub episodes: Vec<CachedItem>,
}

pub fn partition<I>(items: I) -> Partitioned
where
    I: IntoIterator<Item = CachedItem>,
{
    let mut partitioned = Partitioned::default();
    for item in items {
        match item.kind {
            ItemKind::Movie => partitioned.movies.push(item),
            ItemKind::Show { .. } => partitioned.shows.push(item),
            ItemKind::Episode { .. } => partitioned.episodes.push(item),
        }
    }
    partitioned
}

fn downloaded_overview(count: usize) -> String {
    if count == 1 {
        "1 episode downloaded".to_string()
    } else {
        format!("{} episodes downloaded", count)
    }
}

fn synthesize_show(series_id: Uuid, members: &[&CachedItem]) -> Option<CachedItem> {
    let first = members.first()?;
    let series_name = match &first.kind {
        ItemKind::Episode { series_name, .. } => series_name.clone(),
        _ => return None,
    };

    let mut show = CachedItem::show(series_id, series_name.clone());
    show.original_title = Some(series_name);
    show.overview = downloaded_overview(members.len());
    show.run_time_ticks = members.iter().map(|e| e.run_time_ticks).sum();
    show.played = members.iter().all(|e| e.played);
    show.unplayed_item_count = Some(members.iter().filter(|e| !e.played).count() as i32);
    show.community_rating = first.community_rating;
    show.official_rating = Some(String::new());
    show.can_play = true;
    show.can_download = false;
    Some(show)
}

/// One show per distinct series id, in first-seen order.
pub fn virtual_shows(episodes: &[CachedItem]) -> Vec<CachedItem> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut groups: HashMap<Uuid, Vec<&CachedItem>> = HashMap::new();

    for episode in episodes {
        let Some(series_id) = episode.series_id() else {
            continue;
        };
        groups
            .entry(series_id)
            .or_insert_with(|| {
                order.push(series_id);
                Vec::new()
            })
            .push(episode);
    }

    order
        .into_iter()
        .filter_map(|series_id| {
            let members = groups.get(&series_id)?;
            synthesize_show(series_id, members)
        })
        .collect()
}

/// Concatenate then de-duplicate by id; the first occurrence wins.
pub fn merge_shows(real: Vec<CachedItem>, synthesized: Vec<CachedItem>) -> Vec<CachedItem> {
    let mut seen = HashSet::new();
    real.into_iter()
        .chain(synthesized)
        .filter(|show| seen.insert(show.id))
        .collect()
}

/// Sorted, de-duplicated union of movie and show genres.
pub fn collect_genres(movies: &[CachedItem], shows: &[CachedItem]) -> Vec<String> {
    movies
        .iter()
        .chain(shows)
        .flat_map(|item| item.genres.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn matches_genre(item: &CachedItem, genre: Option<&str>) -> bool {
    genre.map_or(true, |g| item.genres.iter().any(|candidate| candidate == g))
}

/// Sections in fixed order Movies, Shows, Episodes with empty ones omitted.
///
/// Movies and shows are narrowed by `selected_genre`; episodes never are.
pub fn build_sections(items: &[CachedItem], selected_genre: Option<&str>) -> Vec<CollectionSection> {
    let Partitioned {
        movies,
        shows,
        episodes,
    } = partition(items.iter().cloned());
    let synthesized = virtual_shows(&episodes);
    let shows = merge_shows(shows, synthesized);

    let movies: Vec<_> = movies
        .into_iter()
        .filter(|m| matches_genre(m, selected_genre))
        .collect();
    let shows: Vec<_> = shows
        .into_iter()
        .filter(|s| matches_genre(s, selected_genre))
        .collect();

    [
        (SectionKind::Movies, movies),
        (SectionKind::Shows, shows),
        (SectionKind::Episodes, episodes),
    ]
    .into_iter()
    .filter(|(_, items)| !items.is_empty())
    .map(|(kind, items)| CollectionSection::new(kind, items))
    .collect()
}

/// Genre facet over a full item set, virtual shows included.
pub fn genres_for(items: &[CachedItem]) -> Vec<String> {
    let Partitioned {
        movies,
        shows,
        episodes,
    } = partition(items.iter().cloned());
    let shows = merge_shows(shows, virtual_shows(&episodes));
    collect_genres(&movies, &shows)
}

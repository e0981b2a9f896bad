//! Turns the categorized `/news` payload into the lists the reader screens show.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{CategorizedHeadlines, Headline};

/// Every headline from the preferred categories, tagged with its category,
/// in an order drawn from `rng`. Empty when nothing matches.
pub fn build_personalized_feed<R, S>(
    all: &CategorizedHeadlines,
    preferred: &[S],
    rng: &mut R,
) -> Vec<Headline>
where
    R: Rng + ?Sized,
    S: AsRef<str>,
{
    let mut feed: Vec<Headline> = all
        .iter()
        .filter(|(category, _)| preferred.iter().any(|p| p.as_ref() == category.as_str()))
        .flat_map(|(category, headlines)| {
            headlines
                .iter()
                .map(move |headline| headline.clone().tagged(category))
        })
        .collect();

    feed.shuffle(rng);
    feed
}

/// Headlines of the single category whose name matches `filter`, ignoring case.
pub fn headlines_for_category(all: &CategorizedHeadlines, filter: &str) -> Vec<Headline> {
    all.iter()
        .filter(|(category, _)| category.eq_ignore_ascii_case(filter))
        .flat_map(|(category, headlines)| {
            headlines
                .iter()
                .map(move |headline| headline.clone().tagged(category))
        })
        .collect()
}

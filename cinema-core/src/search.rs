use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Movie;

/// Who is searching. Authorization is checked by the caller; the role only
/// decides which movies are visible.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Guest,
    Customer,
    FrontDeskStaff,
    Admin,
}

/// Search capability shared by every role.
pub trait MovieSearch {
    /// Whether this searcher may see the movie at all.
    fn can_see(&self, movie: &Movie) -> bool;

    fn search_by_title<'a>(&self, title: &str, movies: &'a [Movie]) -> Vec<&'a Movie> {
        let needle = title.to_lowercase();
        movies
            .iter()
            .filter(|m| self.can_see(m) && m.title.to_lowercase().contains(&needle))
            .collect()
    }

    fn search_by_language<'a>(&self, language: &str, movies: &'a [Movie]) -> Vec<&'a Movie> {
        let needle = language.to_lowercase();
        movies
            .iter()
            .filter(|m| self.can_see(m) && m.language.to_lowercase().contains(&needle))
            .collect()
    }

    fn search_by_genre<'a>(&self, genre: &str, movies: &'a [Movie]) -> Vec<&'a Movie> {
        let needle = genre.to_lowercase();
        movies
            .iter()
            .filter(|m| self.can_see(m) && m.genre.to_lowercase().contains(&needle))
            .collect()
    }

    /// Movies released within `from..=to`.
    fn search_by_date<'a>(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        movies: &'a [Movie],
    ) -> Vec<&'a Movie> {
        movies
            .iter()
            .filter(|m| self.can_see(m) && m.release_date >= from && m.release_date <= to)
            .collect()
    }
}

impl MovieSearch for Role {
    fn can_see(&self, movie: &Movie) -> bool {
        match self {
            Role::Guest | Role::Customer => movie.is_active,
            Role::FrontDeskStaff | Role::Admin => true,
        }
    }
}

/// Combined filter as used by the listing page. `"all"` disables the
/// language or genre criterion; the date range needs both ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovieFilter {
    pub title: Option<String>,
    pub language: Option<String>,
    pub genre: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl MovieFilter {
    pub fn apply<'a, S: MovieSearch + ?Sized>(
        &self,
        searcher: &S,
        movies: &'a [Movie],
    ) -> Vec<&'a Movie> {
        movies
            .iter()
            .filter(|m| searcher.can_see(m) && self.matches(m))
            .collect()
    }

    fn matches(&self, movie: &Movie) -> bool {
        fn contains(hay: &str, needle: &str) -> bool {
            hay.to_lowercase().contains(&needle.to_lowercase())
        }

        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            if !contains(&movie.title, title) {
                return false;
            }
        }
        if let Some(lang) = self.language.as_deref().filter(|l| !l.is_empty() && *l != "all") {
            if !contains(&movie.language, lang) {
                return false;
            }
        }
        if let Some(genre) = self.genre.as_deref().filter(|g| !g.is_empty() && *g != "all") {
            if !contains(&movie.genre, genre) {
                return false;
            }
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if movie.release_date < from || movie.release_date > to {
                return false;
            }
        }
        true
    }
}

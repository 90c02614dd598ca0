use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{Grade, Student};

/// Default snapshot lifetime.
pub const DEFAULT_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Includes clock skew.
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self, ttl_minutes: i64) -> bool {
        self.age_minutes() > ttl_minutes
    }
}

pub struct CacheManager {
    cache_dir: PathBuf,
    ttl_minutes: i64,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache dir {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir,
            ttl_minutes: DEFAULT_TTL_MINUTES,
        })
    }

    pub fn with_ttl(mut self, ttl_minutes: i64) -> Self {
        self.ttl_minutes = ttl_minutes;
        self
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl_minutes
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;
        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;
        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(self.cache_path(name), contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        debug!(cache = name, "Saved snapshot");
        Ok(())
    }

    /// Fresh snapshot or nothing. Unreadable snapshots count as missing.
    fn load_fresh<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        match self.load::<T>(name) {
            Ok(Some(cached)) if !cached.is_stale(self.ttl_minutes) => Some(cached.data),
            Ok(Some(_)) => {
                debug!(cache = name, "Snapshot is stale");
                None
            }
            Ok(None) => None,
            Err(e) => {
                debug!(cache = name, error = %e, "Ignoring unreadable snapshot");
                None
            }
        }
    }

    // ===== Students =====

    pub fn load_students(&self) -> Result<Option<CachedData<Vec<Student>>>> {
        self.load("students")
    }

    pub fn fresh_students(&self) -> Option<Vec<Student>> {
        self.load_fresh("students")
    }

    pub fn save_students(&self, students: &[Student]) -> Result<()> {
        self.save("students", &students)
    }

    // ===== Grades =====

    pub fn load_grades(&self) -> Result<Option<CachedData<Vec<Grade>>>> {
        self.load("grades")
    }

    pub fn fresh_grades(&self) -> Option<Vec<Grade>> {
        self.load_fresh("grades")
    }

    pub fn save_grades(&self, grades: &[Grade]) -> Result<()> {
        self.save("grades", &grades)
    }

    /// Drop the student snapshot, e.g. after points changed.
    pub fn invalidate_students(&self) -> Result<()> {
        let path = self.cache_path("students");
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove students snapshot")?;
        }
        Ok(())
    }

    // ===== Cache Age Information =====

    fn load_age<T>(&self, name: &str, loader: impl FnOnce() -> Result<Option<CachedData<T>>>) -> Option<String> {
        match loader() {
            Ok(Some(cached)) => Some(cached.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(cache = name, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }

    pub fn get_cache_ages(&self) -> CacheAges {
        CacheAges {
            students: self.load_age("students", || self.load_students()),
            grades: self.load_age("grades", || self.load_grades()),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheAges {
    pub students: Option<String>,
    pub grades: Option<String>,
}

impl CacheAges {
    pub fn students_age(&self) -> String {
        self.students.clone().unwrap_or_else(|| "never".to_string())
    }

    pub fn grades_age(&self) -> String {
        self.grades.clone().unwrap_or_else(|| "never".to_string())
    }
}

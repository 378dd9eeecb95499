//! Territorial locality catalog: search, uniqueness resolution and maintenance.
//!
//! Localities (departments, provinces, districts, and populated places below
//! them) are read from a [`stores::LocalityStore`] into a time-bounded
//! in-memory catalog. Searches run against that snapshot; writes go to the
//! store and refresh the snapshot.
//!
//! ## Administrative Hierarchy
//!
//! - Department (7) > Province (6) > District (5)
//! - City (4) > Populated place (3) > Town (2) > Locality (1)
//!
//! The number is the level rank used for ranking bonuses and tie-breaking.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/localities` | List localities matching a filter |
//! | POST | `/api/localities` | Create locality |
//! | GET | `/api/localities/search` | Ranked free-text search |
//! | GET | `/api/localities/{id}` | Get locality by id |
//! | PUT | `/api/localities/{id}` | Update locality |
//! | DELETE | `/api/localities/{id}` | Delete locality |
//! | PATCH | `/api/localities/{id}/active` | Activate or deactivate |
//! | GET | `/api/localities/hierarchy/departments` | Distinct departments |
//! | GET | `/api/localities/hierarchy/provinces` | Provinces in a department |
//! | GET | `/api/localities/hierarchy/districts` | Districts in a province |
//! | POST | `/api/localities/resolve` | Resolve or create one name |
//! | POST | `/api/localities/resolve/batch` | Resolve or create many names |
//! | GET | `/api/localities/duplicates` | Groups sharing a normalized name |
//! | POST | `/api/localities/duplicates/consolidate` | Keep one id, delete the rest |
//! | GET | `/api/localities/catalog/status` | Cache status |
//! | POST | `/api/localities/catalog/refresh` | Force a catalog refresh |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod stores;

pub use services::{CatalogCache, LocalityService, UniquenessResolver};

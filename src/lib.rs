/*!
# Roving QC Backend

The REST backend of a garment factory quality management system, built in Rust.

## Overview

Quality controllers walk the sewing lines and inspect each operator's work
("roving"). For every operator they record the stitches per inch, a
measurement check and the defects found on a small sample of garments. The
server derives each garment's pass/fail state, the operator's quality status
and the overall roving status, and keeps the inspection reports, the defect
catalog and the order master data that the forms are filled from.

## Architecture

### Frontend Layer
- A single page application that renders forms and reports
- Talks to the backend only through the JSON endpoints below, holding the
  `accessToken`/`refreshToken` pair returned at login

### Backend Layer
- **Technologies**: Rust, axum, tokio
- **Core Components**:
  - Status Classifier - Maps garments, defects and SPI/measurement results
    to one of nine roving statuses, coloured by tier
  - Defect Catalog - Sewing defects with per-buyer critical/major/minor rating
  - Roving Reports - One record per date, line and MO with up to five
    inspection rounds
  - Pairing Inspection - T/M/B part measurements against a fractional tolerance
  - Roles and Navigation - Job-title based roles gating the menu
  - Session Manager - argon2 passwords and in-memory access/refresh tokens

### Data Persistence Layer
- One in-memory database written through as a gzip compressed bincode snapshot
- Full backup download and restore
- CSV/XLSX export of roving inspections, CSV and XLSX import of master data

## Modules

- **inspection**: Roving status classification (the core rule table)
- **buyer**: Buyer detection from MO numbers
- **defects**: Sewing defect catalog and buyer severities
- **roving**: Roving inspection records, filters, ordinals and summaries
- **pairing**: Pairing inspection evaluation and reports
- **orders**: Inline orders and line head counts
- **users**: Employee directory
- **roles**: Roles, super admins and role-gated navigation
- **login**: Password hashing, sessions and the auth middleware
- **store**: Shared database with write-through persistence
- **saving**: Snapshot compression and serialization
- **loader**: Master data import from CSV or XLSX
- **downloader**: Export functionality (CSV, XLSX)
- **graph**: Status and reject trend charts
- **images**: Inspection photo storage
- **config**: Environment based configuration
- **app**: Routing and middleware

## REST API Endpoints

- `/api/login`, `/api/register`, `/api/refresh-token` - Sessions
- `/api/role-management`, `/api/user-roles/:emp_id` - Role management
- `/api/sewing-defects` - Defect catalog
- `/api/save-qc-inline-roving` - Save a roving inspection
- `/api/qc-inline-roving-reports` - Filtered roving reports
- `/api/save-qc-roving-pairing` - Save a pairing inspection
- `/api/backup`, `/api/restore` - Database snapshot
*/

#[cfg(feature = "web")]
pub mod app;
pub mod buyer;
pub mod config;
pub mod defects;
pub mod downloader;
pub mod error;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod images;
pub mod inspection;
pub mod loader;
pub mod login;
pub mod orders;
pub mod pairing;
pub mod roles;
pub mod roving;
pub mod saving;
pub mod store;
pub mod users;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use inspection::{RovingStatus, StatusTier};
pub use store::{Database, Store};

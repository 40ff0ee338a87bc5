/*!
# Excel Analytics

A web front end for uploading spreadsheets, charting them and administering users, built in Rust.

## Overview

Users drop an Excel or CSV file onto the upload page, get a preview of its first sheet and
plot chosen columns as line, bar, scatter, area or 3D charts. Administrators manage accounts,
review every uploaded file and follow the activity log. Pages are rendered on the server and
work without JavaScript; small page scripts add drag and drop, the testimonial rotation and
client-side validation.

## Architecture

### Presentation
- **Technologies**: axum, handlebars, plotters (SVG)
- Layout shell with navbar, collapsible sidebar, breadcrumbs, toasts and a modal dialog
- Light and dark themes resolved per request from a preference cookie

### Session state
- Server-side session per browser holding the sidebar and modal state, queued toasts and
  the backend token
- Theme preference kept in a long-lived cookie and mirrored to `localStorage`

### Backend access
- Every data operation goes through the [`api::AnalyticsApi`] trait
- `HttpApi` talks to a deployed backend with bearer-token auth
- `MemoryApi` is a seeded in-process backend used for demos and tests

## Modules

- **config**: environment configuration
- **theme**: theme modes, palettes and preference persistence
- **ui_state**: sidebar and modal state with its reducer
- **session**: session store and middleware
- **toast**: flash notifications
- **breadcrumbs**: navigation trail derived from the URL path
- **upload**: file validation and the upload handlers
- **preview**: CSV parsing into a sheet preview
- **charts**: SVG chart rendering
- **carousel**: testimonials on the landing page
- **nav**: sidebar navigation sets
- **api**: backend client trait and implementations
- **views**, **auth**, **pages**, **admin**, **app**: rendering, routes and the server
*/

pub mod api;
pub mod auth;
pub mod breadcrumbs;
pub mod carousel;
pub mod config;
pub mod error;
pub mod nav;
pub mod preview;
pub mod session;
pub mod theme;
pub mod toast;
pub mod ui_state;
pub mod upload;

#[cfg(feature = "web")]
pub mod admin;
#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod charts;
#[cfg(feature = "web")]
pub mod pages;
#[cfg(feature = "web")]
pub mod views;

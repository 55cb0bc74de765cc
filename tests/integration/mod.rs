//! Integration tests for OpenVox Hostgroups
//!
//! These tests verify the behavior of the API endpoints and the hostgroup
//! service with a real (in-memory) database.

mod api_tests;
mod service_tests;

//! Integration-level tests exercising a realistic dataset end to end,
//! mirroring the worked capitals scenario.

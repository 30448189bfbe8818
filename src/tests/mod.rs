//! Cross-module tests that drive the REST client, the channel store and the
//! scheduler together against a mocked API.

mod interop {
    pub mod helpers;

    mod cache;
    mod context;
    mod dispatch;
    mod parallel;
    mod roundtrip;
    mod scenarios;
}

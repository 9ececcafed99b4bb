/// Authorization gate consumed from the surrounding application. Role
/// resolution happens elsewhere; the ledger only sees the boolean answers
/// and treats `false` as a hard reject before any read or write.
pub trait AccessGate {
    fn can_record(&self, user: &str, group_id: i64) -> bool;
    fn can_view(&self, user: &str, group_id: i64) -> bool;
}

/// Gate for single-operator use (CLI, tests).
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn can_record(&self, _user: &str, _group_id: i64) -> bool {
        true
    }

    fn can_view(&self, _user: &str, _group_id: i64) -> bool {
        true
    }
}

/// Deny-everything gate, handy for exercising the permission path.
pub struct DenyAll;

impl AccessGate for DenyAll {
    fn can_record(&self, _user: &str, _group_id: i64) -> bool {
        false
    }

    fn can_view(&self, _user: &str, _group_id: i64) -> bool {
        false
    }
}

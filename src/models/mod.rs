//! Data models for Circula entities

pub mod book;
pub mod borrower;
pub mod claims;
pub mod loan;
pub mod policy;

pub use book::{Book, BookPatch, NewBook};
pub use borrower::BorrowerContact;
pub use claims::{Claims, Role};
pub use loan::{
    BorrowRequest, Loan, LoanDetails, LoanFilter, LoanPatch, LoanStatus, NewLoan, ReturnCondition,
    ReturnRequest,
};
pub use policy::{CirculationPolicy, NewPolicy};

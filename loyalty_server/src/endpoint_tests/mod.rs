mod accounts;
mod balance;
mod helpers;
mod mocks;
mod orders;

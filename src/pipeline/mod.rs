pub mod diagnosis; // Stage-1 diagnosis → Stage-2 card

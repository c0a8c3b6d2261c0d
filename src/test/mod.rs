mod tracker_scenarios;
